//! Clock abstraction shared by the engine.

pub mod source;

pub use source::{ManualTimeSource, RealTimeSource, SharedClock, TimeSource};
