//! The immutable operation descriptor and its outcome.
//!
//! An [`Operation`] is assembled once per invocation by
//! [`OperationBuilder`], handed to a backend behind an `Arc`, and never
//! mutated afterwards. The backend reports back an [`OperationOutcome`]
//! through a [`RunningOperation`].
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::depsfile::Locks;
use crate::encryption::Encryption;
use crate::engine::CoreEngine;
use crate::planfile::WrappedPlanFile;
use crate::statelock::{LockReport, StateLocker};
use crate::types::addrs::Target;
use crate::types::diagnostics::Diagnostics;
use crate::types::plan::{PlanMode, ResourceCounts};
use crate::types::state::{OutputValue, State};
use crate::views::{ApprovalPrompt, Hook, View};

pub mod builder;
pub mod running;

pub use builder::OperationBuilder;
pub use running::{RunningOperation, StopSignal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationType {
    Plan,
    Apply,
    Refresh,
}

impl OperationType {
    /// Name recorded in lock holder info.
    #[must_use]
    pub fn lock_name(self) -> &'static str {
        match self {
            OperationType::Plan => "OperationTypePlan",
            OperationType::Apply => "OperationTypeApply",
            OperationType::Refresh => "OperationTypeRefresh",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Plan => "plan",
            OperationType::Apply => "apply",
            OperationType::Refresh => "refresh",
        }
    }
}

pub struct Operation {
    pub(crate) id: Uuid,
    pub(crate) op_type: OperationType,
    pub(crate) mode: PlanMode,
    pub(crate) targets: Vec<Target>,
    pub(crate) excludes: Vec<Target>,
    pub(crate) parallelism: usize,
    pub(crate) auto_approve: bool,
    pub(crate) plan_file: Option<WrappedPlanFile>,
    pub(crate) plan_out: Option<PathBuf>,
    pub(crate) config_dir: PathBuf,
    pub(crate) has_config: bool,
    pub(crate) workspace: String,
    pub(crate) locks: Locks,
    pub(crate) state_locker: Arc<dyn StateLocker>,
    pub(crate) hooks: Vec<Arc<dyn Hook>>,
    pub(crate) view: Arc<dyn View>,
    pub(crate) prompt: Option<Arc<dyn ApprovalPrompt>>,
    pub(crate) input_enabled: bool,
    pub(crate) encryption: Arc<dyn Encryption>,
    pub(crate) engine: Arc<dyn CoreEngine>,
}

impl Operation {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    #[must_use]
    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    #[must_use]
    pub fn excludes(&self) -> &[Target] {
        &self.excludes
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    #[must_use]
    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    #[must_use]
    pub fn plan_file(&self) -> Option<&WrappedPlanFile> {
        self.plan_file.as_ref()
    }

    /// `plan -out`: where a computed plan is saved.
    #[must_use]
    pub fn plan_out(&self) -> Option<&Path> {
        self.plan_out.as_deref()
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    #[must_use]
    pub fn has_config(&self) -> bool {
        self.has_config
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    #[must_use]
    pub fn locks(&self) -> &Locks {
        &self.locks
    }

    #[must_use]
    pub fn state_locker(&self) -> &Arc<dyn StateLocker> {
        &self.state_locker
    }

    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn Hook>] {
        &self.hooks
    }

    #[must_use]
    pub fn view(&self) -> &Arc<dyn View> {
        &self.view
    }

    #[must_use]
    pub fn prompt(&self) -> Option<&Arc<dyn ApprovalPrompt>> {
        self.prompt.as_ref()
    }

    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    #[must_use]
    pub fn encryption(&self) -> &Arc<dyn Encryption> {
        &self.encryption
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn CoreEngine> {
        &self.engine
    }
}

/// How the backend classified a finished operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperationResult {
    Success,
    #[default]
    Failure,
    /// The approval prompt was answered with anything but "yes".
    DeclinedApproval,
    /// Stopped by an interrupt.
    Cancelled,
}

impl OperationResult {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == OperationResult::Success
    }
}

#[derive(Debug, Default)]
pub struct OperationOutcome {
    pub result: OperationResult,
    pub diags: Diagnostics,
    /// Plan operations: the computed plan proposes changes.
    pub plan_has_changes: bool,
    /// State persisted by the operation, if any.
    pub state: Option<State>,
    pub counts: ResourceCounts,
    pub outputs: BTreeMap<String, OutputValue>,
    pub lock: Option<LockReport>,
}

impl OperationOutcome {
    #[must_use]
    pub fn failure(diags: Diagnostics) -> Self {
        Self {
            result: OperationResult::Failure,
            diags,
            ..Self::default()
        }
    }

    /// Process exit status. With `detailed`, a successful plan proposing
    /// changes exits 2.
    #[must_use]
    pub fn exit_code(&self, detailed: bool) -> i32 {
        match self.result {
            OperationResult::Success if detailed && self.plan_has_changes => 2,
            OperationResult::Success => 0,
            OperationResult::Failure | OperationResult::DeclinedApproval | OperationResult::Cancelled => 1,
        }
    }
}
