//! # duskswitch
//!
//! Library behind the `duskswitch` binary: an automatic light/dark theme
//! scheduler with postpones, a night-light governor and a command socket.
//!
//! ## Architecture
//!
//! - **Service**: [`Service`] wires everything together and runs the main loop
//! - **Engine**: `core` holds the shared state, the switch coordinator and the
//!   refresh worker
//! - **Themes**: `theme` has the resolver and the command applier
//! - **Postpones**: `postpone` keeps skips, delays and locks that hold off
//!   automatic switching, and persists them across restarts
//! - **Schedule**: `geo` computes sunrise/sunset boundaries, `time` abstracts
//!   the clock
//! - **Events**: `events` turns OS and hotkey events into engine calls; `io`
//!   holds the D-Bus monitors, signals and instance locking
//! - **Interfaces**: `ipc` is the command socket, `args` and `commands` the CLI
//! - **Configuration**: `config` loads, validates and watches `duskswitch.toml`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod commands;
pub mod config;
pub mod core;
pub mod events;
pub mod geo;
pub mod io;
pub mod ipc;
pub mod postpone;
pub mod service;
pub mod theme;
pub mod time;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use service::Service;
