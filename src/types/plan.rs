use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::OutputValue;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    #[default]
    Normal,
    Destroy,
    RefreshOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    NoOp,
    Create,
    Update,
    Delete,
    /// Delete then create; counts as one add and one destroy.
    Replace,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    pub action: ChangeAction,
    /// Object after the change; `None` for deletions.
    #[serde(default)]
    pub after: Option<Value>,
}

/// Backend configuration recorded by the run that produced a local plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanBackend {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub config: Option<Value>,
    pub workspace: String,
}

/// Execution plan embedded in a local plan artifact.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub mode: PlanMode,
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
    #[serde(default)]
    pub output_changes: BTreeMap<String, OutputValue>,
    #[serde(default)]
    pub backend: Option<PlanBackend>,
    /// Lineage and serial of the state the plan was computed against.
    #[serde(default)]
    pub prior_lineage: Option<String>,
    #[serde(default)]
    pub prior_serial: Option<u64>,
    /// Planning stopped on errors; such a plan is informational only.
    #[serde(default)]
    pub errored: bool,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Plan {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != ChangeAction::NoOp)
    }

    #[must_use]
    pub fn applyable(&self) -> bool {
        !self.errored
    }

    /// Embedded backend configuration, if the writer recorded one.
    #[must_use]
    pub fn backend_config(&self) -> Option<(&PlanBackend, &Value)> {
        self.backend
            .as_ref()
            .and_then(|b| b.config.as_ref().map(|c| (b, c)))
    }
}

/// Resource counts used by summary rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub added: usize,
    pub changed: usize,
    pub destroyed: usize,
}

impl ResourceCounts {
    #[must_use]
    pub fn of_plan(plan: &Plan) -> Self {
        let mut c = Self::default();
        for ch in &plan.changes {
            match ch.action {
                ChangeAction::NoOp => {}
                ChangeAction::Create => c.added += 1,
                ChangeAction::Update => c.changed += 1,
                ChangeAction::Delete => c.destroyed += 1,
                ChangeAction::Replace => {
                    c.added += 1;
                    c.destroyed += 1;
                }
            }
        }
        c
    }
}
