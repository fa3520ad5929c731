//! Waiting for, holding and releasing state locks.
//!
//! [`TimedLocker`] retries a contended [`StateMgr::lock`] with exponential
//! backoff until the configured timeout; [`NoopLocker`] is used when locking
//! is disabled. Either returns a [`StateLock`] guard that must be released
//! exactly once, on every exit path.
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{LOCK_BACKOFF_MAX_MS, LOCK_POLL_MS};
use crate::interrupt::InterruptContext;
use crate::statemgr::{LockError, LockInfo, StateMgr};
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::views::View;

const LOCK_ADVICE: &str = "OpenTofu acquires a state lock to protect the state from being written\n\
by multiple users at the same time. Please resolve the issue above and try\n\
again. For most commands, you can disable locking with the \"-lock=false\"\n\
flag, but this is not recommended.";

/// Summary of the diagnostic returned when a held lock cannot be released.
pub const RELEASE_FAILED: &str = "Error releasing the state lock";

/// Bookkeeping for one acquisition, reported in lock facts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockReport {
    pub backend: String,
    pub acquired: bool,
    pub attempts: u64,
    pub wait_ms: u64,
}

/// Acquisition failed; `diags` carries a contention error for the user.
#[derive(Debug)]
pub struct LockFailed {
    pub report: LockReport,
    pub diags: Diagnostics,
}

pub trait StateLocker: Send + Sync {
    /// Lock `mgr` on behalf of `operation` (e.g. `OperationTypeApply`).
    ///
    /// # Errors
    /// Returns [`LockFailed`] if the lock could not be taken in time.
    fn lock(&self, mgr: Arc<dyn StateMgr>, operation: &str) -> Result<StateLock, LockFailed>;

    /// True if this locker actually takes locks.
    fn enabled(&self) -> bool {
        true
    }
}

/// Held lock. Call [`release`](Self::release) to observe release errors;
/// dropping it releases too but can only log failures.
pub struct StateLock {
    mgr: Arc<dyn StateMgr>,
    id: Option<String>,
    report: LockReport,
}

impl StateLock {
    #[must_use]
    pub fn report(&self) -> &LockReport {
        &self.report
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Release the lock; errors come back as a contention diagnostic.
    #[must_use]
    pub fn release(mut self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(id) = self.id.take() {
            if let Err(e) = self.mgr.unlock(&id) {
                diags.push(Diagnostic::error(
                    DiagClass::Contention,
                    RELEASE_FAILED,
                    format!(
                        "Error message: {e}\n\nOpenTofu acquired a lock on the state for you, but could not release it.\n\
                         You may need to unlock it manually using the lock ID: {id}"
                    ),
                ));
            }
        }
        diags
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(e) = self.mgr.unlock(&id) {
                log::warn!("failed to release state lock {id} on {}: {e}", self.mgr.name());
            }
        }
    }
}

/// Always succeeds without touching the state manager.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLocker;

impl StateLocker for NoopLocker {
    fn lock(&self, mgr: Arc<dyn StateMgr>, _operation: &str) -> Result<StateLock, LockFailed> {
        let report = LockReport {
            backend: mgr.name(),
            ..LockReport::default()
        };
        Ok(StateLock { mgr, id: None, report })
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Retries contended locks until `timeout`. A zero timeout tries once.
pub struct TimedLocker {
    timeout: Duration,
    view: Option<Arc<dyn View>>,
    interrupts: Option<InterruptContext>,
}

impl TimedLocker {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            view: None,
            interrupts: None,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: Arc<dyn View>) -> Self {
        self.view = Some(view);
        self
    }

    /// Stop waiting once an interrupt has been received.
    #[must_use]
    pub fn with_interrupts(mut self, ctx: InterruptContext) -> Self {
        self.interrupts = Some(ctx);
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn interrupted(&self) -> bool {
        self.interrupts.as_ref().is_some_and(InterruptContext::stop_requested)
    }
}

fn failure(err: &LockError) -> Diagnostics {
    Diagnostics::new().with(Diagnostic::error(
        DiagClass::Contention,
        "Error acquiring the state lock",
        format!("Error message: {err}\n\n{LOCK_ADVICE}"),
    ))
}

fn interrupted() -> Diagnostics {
    Diagnostics::new().with(Diagnostic::error(
        DiagClass::Interrupted,
        "State lock wait interrupted",
        "An interrupt was received while waiting for the state lock. No changes were made.",
    ))
}

impl StateLocker for TimedLocker {
    fn lock(&self, mgr: Arc<dyn StateMgr>, operation: &str) -> Result<StateLock, LockFailed> {
        let t0 = Instant::now();
        // No representable deadline: wait until released or interrupted.
        let deadline = t0.checked_add(self.timeout);
        let info = LockInfo::new(operation);
        let mut report = LockReport {
            backend: mgr.name(),
            ..LockReport::default()
        };
        let mut delay = Duration::from_millis(LOCK_POLL_MS);
        let mut announced = false;
        loop {
            report.attempts += 1;
            let res = mgr.lock(&info);
            report.wait_ms = u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX);
            let err = match res {
                Ok(id) => {
                    report.acquired = true;
                    return Ok(StateLock { mgr, id: Some(id), report });
                }
                Err(e) => e,
            };
            if err.contended && self.interrupted() {
                let mut diags = interrupted();
                diags.extend(failure(&err));
                return Err(LockFailed { report, diags });
            }
            let now = Instant::now();
            if !err.contended || deadline.is_some_and(|d| now >= d) {
                return Err(LockFailed {
                    report,
                    diags: failure(&err),
                });
            }
            if !announced {
                announced = true;
                if let Some(v) = &self.view {
                    v.message("Acquiring state lock. This may take a few moments...");
                }
            }
            thread::sleep(deadline.map_or(delay, |d| delay.min(d - now)));
            delay = (delay * 2).min(Duration::from_millis(LOCK_BACKOFF_MAX_MS));
        }
    }
}
