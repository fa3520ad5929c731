//! Cooperative interruption shared between a signal handler and the runner.
//!
//! The first interrupt asks the running operation to stop gracefully; the
//! second one cancels it outright.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct InterruptContext {
    count: Arc<AtomicU32>,
}

impl InterruptContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one interrupt and return the running total.
    pub fn interrupt(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.count() >= 1
    }

    #[must_use]
    pub fn cancel_requested(&self) -> bool {
        self.count() >= 2
    }
}
