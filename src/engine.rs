//! External collaborators: the evaluation engine and the configuration loader.
//!
//! The core never computes resource changes itself. It hands prior state
//! and intent to a [`CoreEngine`] and persists what comes back.
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::types::addrs::{Provider, Target};
use crate::types::diagnostics::Diagnostics;
use crate::types::plan::{Plan, PlanMode};
use crate::types::state::State;
use crate::views::Hook;

pub struct PlanRequest<'a> {
    pub mode: PlanMode,
    pub prior: &'a State,
    pub targets: &'a [Target],
    pub excludes: &'a [Target],
    pub parallelism: usize,
}

pub trait CoreEngine: Send + Sync {
    /// Compute a plan. `None` means planning failed before producing anything.
    fn plan(&self, req: &PlanRequest<'_>) -> (Option<Plan>, Diagnostics);

    /// Apply `plan` on top of `prior`, calling `hooks` around every change.
    /// Returns the resulting state even when some changes failed.
    fn apply(&self, plan: &Plan, prior: &State, hooks: &[Arc<dyn Hook>], parallelism: usize) -> (Option<State>, Diagnostics);

    /// Ask an in-flight `plan` or `apply` to finish early at a safe point.
    fn stop(&self);
}

/// Backend block declared by the root module.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    pub type_name: String,
    pub config: Value,
}

pub trait ConfigLoader: Send + Sync {
    /// True if `dir` contains configuration files.
    fn has_config(&self, dir: &Path) -> bool;

    /// The declared backend block, if any.
    fn load_backend_config(&self, dir: &Path) -> (Option<BackendConfig>, Diagnostics);

    /// Providers the configuration depends on.
    fn required_providers(&self, _dir: &Path) -> BTreeSet<Provider> {
        BTreeSet::new()
    }
}

/// Loader returning fixed answers regardless of directory.
#[derive(Clone, Debug, Default)]
pub struct StaticConfigLoader {
    pub has_config: bool,
    pub backend: Option<BackendConfig>,
    pub required: BTreeSet<Provider>,
}

impl StaticConfigLoader {
    /// A root module with configuration and no backend block.
    #[must_use]
    pub fn local() -> Self {
        Self {
            has_config: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backend(mut self, type_name: &str, config: Value) -> Self {
        self.backend = Some(BackendConfig {
            type_name: type_name.to_string(),
            config,
        });
        self
    }

    #[must_use]
    pub fn requiring(mut self, provider: Provider) -> Self {
        self.required.insert(provider);
        self
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn has_config(&self, _dir: &Path) -> bool {
        self.has_config
    }

    fn load_backend_config(&self, _dir: &Path) -> (Option<BackendConfig>, Diagnostics) {
        (self.backend.clone(), Diagnostics::new())
    }

    fn required_providers(&self, _dir: &Path) -> BTreeSet<Provider> {
        self.required.clone()
    }
}
