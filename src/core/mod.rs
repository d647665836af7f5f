//! Switch engine: shared state, the switch coordinator and the refresh worker.

pub mod coordinator;
pub mod refresh;
pub mod state;

pub use coordinator::{SwitchCoordinator, SwitchOutcome, SwitchStatus};
pub use refresh::{Broadcaster, HookBroadcaster, RefreshJob, RefreshQueue, RefreshWorker};
pub use state::{EngineSettings, GlobalState};
