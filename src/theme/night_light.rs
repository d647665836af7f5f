//! The night-light signal consumed by the NightLight governor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the desktop's night light is currently active.
pub trait NightLightSignal: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Last known night-light state, written by a monitor and read by the engine.
#[derive(Debug, Clone, Default)]
pub struct NightLightState {
    active: Arc<AtomicBool>,
}

impl NightLightState {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    /// Store a new reading. Returns `true` if it differs from the previous one.
    pub fn set(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::SeqCst) != active
    }
}

impl NightLightSignal for NightLightState {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
