//! Backends: where state lives and where operations execute.
//!
//! A backend is chosen by [`resolver::BackendResolver`], built through the
//! [`init::Registry`], and driven with [`Backend::operation`]. Optional
//! abilities are exposed as [`Capability`] values rather than discovered by
//! downcasting.
use std::sync::Arc;

use crate::operation::{Operation, RunningOperation};
use crate::statemgr::StateMgr;
use crate::types::diagnostics::Diagnostics;

pub mod init;
pub mod local;
pub mod resolver;
pub mod state;

pub use init::{BackendInit, Registry};
pub use local::LocalBackend;
pub use resolver::{BackendResolver, BackendSource, Resolved};
pub use state::BackendRecord;

/// An optional backend ability.
#[derive(Debug)]
pub enum Capability<T> {
    Present(T),
    Absent { backend: String },
}

impl<T> Capability<T> {
    #[must_use]
    pub fn present(self) -> Option<T> {
        match self {
            Capability::Present(t) => Some(t),
            Capability::Absent { .. } => None,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Capability::Present(_))
    }
}

/// Backends that may run operations on a remote service.
pub trait RemoteRunReporter {
    /// True if operations execute in this process; false if a remote run
    /// already rendered its own summary.
    fn is_local_operations(&self) -> bool;
}

pub trait Backend: Send + Sync {
    fn type_name(&self) -> &str;

    /// State manager for `workspace`.
    ///
    /// # Errors
    /// Returns configuration diagnostics if the workspace cannot be addressed.
    fn state_mgr(&self, workspace: &str) -> Result<Arc<dyn StateMgr>, Diagnostics>;

    /// Start `op`. Failures discovered while running are reported in the
    /// outcome; only failures to start are returned here.
    ///
    /// # Errors
    /// Returns diagnostics if the operation type is not supported.
    fn operation(&self, op: Arc<Operation>) -> Result<RunningOperation, Diagnostics>;

    fn remote_reporter(&self) -> Capability<&dyn RemoteRunReporter> {
        Capability::Absent {
            backend: self.type_name().to_string(),
        }
    }
}
