use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{CLI_NAME, DEFAULT_PARALLELISM, DEFAULT_WORKSPACE};
use crate::depsfile::{Locks, ProviderOverrides};
use crate::encryption::{Disabled, Encryption};
use crate::engine::CoreEngine;
use crate::planfile::WrappedPlanFile;
use crate::statelock::{NoopLocker, StateLocker};
use crate::types::addrs::{Provider, Target};
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::types::ids::operation_id;
use crate::types::plan::PlanMode;
use crate::views::{ApprovalPrompt, Hook, View};

use super::{Operation, OperationType};

/// Error for a destroy request that also names a saved plan.
#[must_use]
pub fn destroy_with_plan_diag(plan_path: &str) -> Diagnostic {
    Diagnostic::error(
        DiagClass::UserInput,
        "Destroy can't be called with a plan file",
        format!(
            "If this plan was created using plan -destroy, apply it using:\n  {CLI_NAME} apply \"{plan_path}\""
        ),
    )
}

/// Collects caller intent and produces an immutable [`Operation`].
pub struct OperationBuilder {
    op_type: OperationType,
    mode: PlanMode,
    config_dir: PathBuf,
    has_config: bool,
    targets: Vec<Target>,
    excludes: Vec<Target>,
    parallelism: usize,
    auto_approve: bool,
    plan_file: Option<WrappedPlanFile>,
    plan_out: Option<PathBuf>,
    workspace: String,
    locks: Locks,
    overrides: ProviderOverrides,
    required: BTreeSet<Provider>,
    running_in_automation: bool,
    state_locker: Arc<dyn StateLocker>,
    hooks: Vec<Arc<dyn Hook>>,
    view: Option<Arc<dyn View>>,
    prompt: Option<Arc<dyn ApprovalPrompt>>,
    input_enabled: bool,
    encryption: Arc<dyn Encryption>,
    engine: Option<Arc<dyn CoreEngine>>,
}

impl OperationBuilder {
    #[must_use]
    pub fn new(op_type: OperationType, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            op_type,
            mode: PlanMode::Normal,
            config_dir: config_dir.into(),
            has_config: true,
            targets: Vec::new(),
            excludes: Vec::new(),
            parallelism: DEFAULT_PARALLELISM,
            auto_approve: false,
            plan_file: None,
            plan_out: None,
            workspace: DEFAULT_WORKSPACE.to_string(),
            locks: Locks::new(),
            overrides: ProviderOverrides::default(),
            required: BTreeSet::new(),
            running_in_automation: false,
            state_locker: Arc::new(NoopLocker),
            hooks: Vec::new(),
            view: None,
            prompt: None,
            input_enabled: false,
            encryption: Arc::new(Disabled),
            engine: None,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: PlanMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn has_config(mut self, yes: bool) -> Self {
        self.has_config = yes;
        self
    }

    #[must_use]
    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn excludes(mut self, excludes: Vec<Target>) -> Self {
        self.excludes = excludes;
        self
    }

    #[must_use]
    pub fn parallelism(mut self, n: usize) -> Self {
        self.parallelism = n;
        self
    }

    #[must_use]
    pub fn auto_approve(mut self, yes: bool) -> Self {
        self.auto_approve = yes;
        self
    }

    #[must_use]
    pub fn plan_file(mut self, plan: Option<WrappedPlanFile>) -> Self {
        self.plan_file = plan;
        self
    }

    #[must_use]
    pub fn plan_out(mut self, path: Option<PathBuf>) -> Self {
        self.plan_out = path;
        self
    }

    #[must_use]
    pub fn workspace(mut self, name: impl Into<String>) -> Self {
        self.workspace = name.into();
        self
    }

    /// Dependency locks, already annotated with `overrides`.
    #[must_use]
    pub fn locks(mut self, locks: Locks, overrides: ProviderOverrides) -> Self {
        self.locks = locks;
        self.overrides = overrides;
        self
    }

    /// Providers the configuration needs; each must be locked or overridden.
    #[must_use]
    pub fn required_providers(mut self, required: BTreeSet<Provider>) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn running_in_automation(mut self, yes: bool) -> Self {
        self.running_in_automation = yes;
        self
    }

    #[must_use]
    pub fn state_locker(mut self, locker: Arc<dyn StateLocker>) -> Self {
        self.state_locker = locker;
        self
    }

    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn view(mut self, view: Arc<dyn View>) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: Option<Arc<dyn ApprovalPrompt>>, input_enabled: bool) -> Self {
        self.prompt = prompt;
        self.input_enabled = input_enabled;
        self
    }

    #[must_use]
    pub fn encryption(mut self, enc: Arc<dyn Encryption>) -> Self {
        self.encryption = enc;
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn CoreEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    fn missing_plugins(&self) -> Option<Diagnostic> {
        let missing: Vec<&Provider> = self
            .required
            .iter()
            .filter(|p| self.locks.provider(p).is_none() && !self.locks.provider_is_overridden(p))
            .collect();
        if missing.is_empty() {
            return None;
        }
        let mut detail = String::from(
            "The installed provider plugins are not consistent with the packages selected in the dependency lock file:\n",
        );
        for p in missing {
            let _ = writeln!(detail, "  - {p}: required by this configuration but no version is selected");
        }
        if self.running_in_automation {
            detail.push_str(
                "\nProvider plugins must be installed by the initialization step of this automation before running this command.",
            );
        } else {
            let _ = write!(
                detail,
                "\nOpenTofu uses external plugins to integrate with a variety of different infrastructure services. To download the plugins required for this configuration, run:\n  {CLI_NAME} init"
            );
        }
        Some(Diagnostic::error(
            DiagClass::Configuration,
            "Required plugins are not installed",
            detail,
        ))
    }

    /// Validate and freeze the operation.
    ///
    /// On success also returns warnings that must be shown before the
    /// backend starts, e.g. active provider development overrides.
    ///
    /// # Errors
    /// Returns error diagnostics for incompatible combinations.
    pub fn build(mut self) -> Result<(Operation, Diagnostics), Diagnostics> {
        let mut diags = Diagnostics::new();
        if self.mode == PlanMode::Destroy {
            if let Some(pf) = &self.plan_file {
                diags.push(destroy_with_plan_diag(&pf.path().display().to_string()));
            }
        }
        if self.plan_file.is_some() && self.op_type != OperationType::Apply {
            diags.push(Diagnostic::error(
                DiagClass::UserInput,
                "Saved plan is not allowed",
                format!("A saved plan file can only be used with \"{CLI_NAME} apply\"."),
            ));
        }
        if self.parallelism == 0 {
            diags.push(Diagnostic::error(
                DiagClass::UserInput,
                "Invalid parallelism",
                "The -parallelism value must be at least 1.",
            ));
        }
        if let Some(d) = self.missing_plugins() {
            diags.push(d);
        }
        let Some(view) = self.view.take() else {
            diags.push(Diagnostic::bug("Operation has no view", "An operation was built without an output sink."));
            return Err(diags);
        };
        let Some(engine) = self.engine.take() else {
            diags.push(Diagnostic::bug(
                "Operation has no engine",
                "An operation was built without an evaluation engine.",
            ));
            return Err(diags);
        };
        if diags.has_errors() {
            return Err(diags);
        }

        self.targets.sort();
        self.targets.dedup();
        self.excludes.sort();
        self.excludes.dedup();
        let plan_path = self.plan_file.as_ref().map(|p| p.path().display().to_string());
        let id = operation_id(
            self.op_type.as_str(),
            self.mode,
            plan_path.as_deref(),
            &self.targets,
            &self.excludes,
        );
        let warnings = self.overrides.runtime_warnings();
        let op = Operation {
            id,
            op_type: self.op_type,
            mode: self.mode,
            targets: self.targets,
            excludes: self.excludes,
            parallelism: self.parallelism,
            auto_approve: self.auto_approve,
            plan_file: self.plan_file,
            plan_out: self.plan_out,
            config_dir: self.config_dir,
            has_config: self.has_config,
            workspace: self.workspace,
            locks: self.locks,
            state_locker: self.state_locker,
            hooks: self.hooks,
            view,
            prompt: self.prompt,
            input_enabled: self.input_enabled,
            encryption: self.encryption,
            engine,
        };
        Ok((op, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlanRequest;
    use crate::planfile::{create_local, open_path};
    use crate::types::plan::{Plan, ResourceCounts};
    use crate::types::state::{OutputValue, State};
    use std::collections::BTreeMap;

    struct NullView;
    impl View for NullView {
        fn diagnostics(&self, _: &Diagnostics) {}
        fn message(&self, _: &str) {}
        fn cancelled(&self, _: PlanMode) {}
        fn plan(&self, _: &Plan) {}
        fn resource_count(&self, _: crate::views::SummaryKind, _: ResourceCounts) {}
        fn outputs(&self, _: &BTreeMap<String, OutputValue>) {}
    }

    struct NullEngine;
    impl CoreEngine for NullEngine {
        fn plan(&self, _: &PlanRequest<'_>) -> (Option<Plan>, Diagnostics) {
            (Some(Plan::default()), Diagnostics::new())
        }
        fn apply(&self, _: &Plan, prior: &State, _: &[Arc<dyn Hook>], _: usize) -> (Option<State>, Diagnostics) {
            (Some(prior.clone()), Diagnostics::new())
        }
        fn stop(&self) {}
    }

    fn base(op: OperationType) -> OperationBuilder {
        OperationBuilder::new(op, ".").view(Arc::new(NullView)).engine(Arc::new(NullEngine))
    }

    #[test]
    fn destroy_with_plan_file_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("saved.tfplan");
        create_local(&p, &Plan::default(), &Disabled).unwrap();
        let pf = open_path(&p, &Disabled).unwrap();
        let err = base(OperationType::Apply)
            .mode(PlanMode::Destroy)
            .plan_file(pf)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.error_class(), Some(DiagClass::UserInput));
        assert!(err.error_message().contains("plan file"));
    }

    #[test]
    fn missing_plugins_suggest_init() {
        let p = Provider::parse("hashicorp/null").unwrap();
        let err = base(OperationType::Apply)
            .required_providers([p.clone()].into_iter().collect())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.error_class(), Some(DiagClass::Configuration));
        assert!(err.error_message().contains("tofu init"));

        let mut locks = Locks::new();
        locks.set_provider_overridden(p.clone());
        let ok = base(OperationType::Apply)
            .required_providers([p].into_iter().collect())
            .locks(locks, ProviderOverrides::default())
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn dev_overrides_produce_warnings_and_ids_are_stable() {
        let mut ov = ProviderOverrides::default();
        ov.dev.insert(Provider::parse("hashicorp/null").unwrap(), PathBuf::from("/tmp/null"));
        let t = vec![Target::parse("b.b").unwrap(), Target::parse("a.a").unwrap()];
        let (op, warnings) = base(OperationType::Apply)
            .targets(t.clone())
            .locks(Locks::new(), ov)
            .build()
            .ok()
            .unwrap();
        assert_eq!(warnings.warnings().count(), 1);
        assert_eq!(op.targets()[0].as_str(), "a.a");
        let (again, _) = base(OperationType::Apply).targets(t).build().ok().unwrap();
        assert_eq!(op.id(), again.id());
    }
}
