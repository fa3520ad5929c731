use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::types::diagnostics::{Diagnostic, Diagnostics};

use super::OperationOutcome;

/// Stop and cancel requests shared between the runner and the worker.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    stop: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish at the next safe point.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Abandon the operation. Implies stop.
    pub fn cancel(&self) {
        self.stop();
        self.cancel.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Handle to an operation executing on a worker thread.
pub struct RunningOperation {
    rx: Receiver<OperationOutcome>,
    signal: StopSignal,
}

impl RunningOperation {
    /// Run `work` on a new thread. `work` receives the signal it must poll.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(StopSignal) -> OperationOutcome + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let signal = StopSignal::new();
        let worker_signal = signal.clone();
        thread::spawn(move || {
            let _ = tx.send(work(worker_signal));
        });
        Self { rx, signal }
    }

    /// An operation that already finished, e.g. one rejected up front.
    #[must_use]
    pub fn done(outcome: OperationOutcome) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(outcome);
        Self {
            rx,
            signal: StopSignal::new(),
        }
    }

    #[must_use]
    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    pub fn stop(&self) {
        self.signal.stop();
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// Wait up to `timeout`; `None` if the operation is still running.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<OperationOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(o) => Some(o),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(vanished()),
        }
    }

    /// Block until the operation reports.
    #[must_use]
    pub fn wait(self) -> OperationOutcome {
        self.rx.recv().unwrap_or_else(|_| vanished())
    }
}

fn vanished() -> OperationOutcome {
    OperationOutcome::failure(Diagnostics::new().with(Diagnostic::bug(
        "Operation ended without a result",
        "The worker running this operation stopped before reporting an outcome.",
    )))
}
