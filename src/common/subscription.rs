//! Explicit registration handles.
//!
//! Anything that registers a callback or starts a monitor hands back a
//! [`Subscription`]. Teardown is deterministic: it runs exactly once, either
//! from [`Subscription::unsubscribe`] or when the handle is dropped.

type Teardown = Box<dyn FnOnce() + Send>;

#[must_use = "dropping a Subscription immediately cancels it"]
pub struct Subscription {
    teardown: Option<Teardown>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A handle with nothing to tear down (e.g. a monitor that failed to start).
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    /// Keep the registration alive for the rest of the process.
    pub fn detach(mut self) {
        self.teardown = None;
    }

    fn cancel(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
