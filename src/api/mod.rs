// Facade for the execution core; stages live in submodules under src/api/.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::Level;

use crate::api::errors::ApiError;
use crate::backend::{Registry, Resolved};
use crate::config::Settings;
use crate::depsfile::{Locks, ProviderOverrides};
use crate::encryption::{Disabled, Encryption};
use crate::engine::{ConfigLoader, CoreEngine, StaticConfigLoader};
use crate::interrupt::InterruptContext;
use crate::logging::audit::AuditCtx;
use crate::logging::{now_iso, AuditSink, FactsEmitter};
use crate::operation::OperationOutcome;
use crate::planfile::WrappedPlanFile;
use crate::types::addrs::Target;
use crate::types::diagnostics::Diagnostics;
use crate::types::ids::operation_id;
use crate::types::plan::PlanMode;
use crate::views::{ApprovalPrompt, Hook, StreamView, View};

mod apply;
mod backend;
mod builder;
pub mod errors;
mod operation;
mod plan;
mod plan_file;
mod run;

pub use builder::OpCoreBuilder;

/// `apply` and `destroy`.
#[derive(Clone, Debug, Default)]
pub struct ApplyCommand {
    /// Saved plan to apply instead of planning afresh.
    pub plan_path: Option<PathBuf>,
    pub destroy: bool,
    pub auto_approve: bool,
    pub targets: Vec<Target>,
    pub excludes: Vec<Target>,
}

/// `plan`.
#[derive(Clone, Debug, Default)]
pub struct PlanCommand {
    pub mode: PlanMode,
    /// `-out`: save the plan here.
    pub out: Option<PathBuf>,
    pub targets: Vec<Target>,
    pub excludes: Vec<Target>,
}

/// `refresh` / `apply -refresh-only`.
#[derive(Clone, Debug, Default)]
pub struct RefreshCommand {
    pub targets: Vec<Target>,
    pub excludes: Vec<Target>,
}

pub struct OpCore<E: FactsEmitter, A: AuditSink> {
    facts: E,
    audit: A,
    settings: Settings,
    engine: Arc<dyn CoreEngine>,
    loader: Arc<dyn ConfigLoader>,
    registry: Registry,
    encryption: Arc<dyn Encryption>,
    overrides: ProviderOverrides,
    view: Arc<dyn View>,
    prompt: Option<Arc<dyn ApprovalPrompt>>,
    hooks: Vec<Arc<dyn Hook>>,
    interrupts: InterruptContext,
    redact: bool,
}

impl<E: FactsEmitter, A: AuditSink> OpCore<E, A> {
    pub fn new(facts: E, audit: A, settings: Settings, engine: Arc<dyn CoreEngine>) -> Self {
        Self {
            facts,
            audit,
            settings,
            engine,
            loader: Arc::new(StaticConfigLoader::local()),
            registry: Registry::default(),
            encryption: Arc::new(Disabled),
            overrides: ProviderOverrides::default(),
            view: Arc::new(StreamView::stdio()),
            prompt: None,
            hooks: Vec::new(),
            interrupts: InterruptContext::new(),
            redact: false,
        }
    }

    #[must_use]
    pub fn with_config_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_encryption(mut self, enc: Arc<dyn Encryption>) -> Self {
        self.encryption = enc;
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ProviderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn with_view(mut self, view: Arc<dyn View>) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn ApprovalPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Share an interrupt context with the caller's signal handler.
    #[must_use]
    pub fn with_interrupts(mut self, ctx: InterruptContext) -> Self {
        self.interrupts = ctx;
        self
    }

    /// Zero timestamps and drop timings in emitted facts.
    #[must_use]
    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptContext {
        &self.interrupts
    }

    fn ctx(&self, kind: &str, mode: PlanMode, plan: Option<&Path>, targets: &[Target], excludes: &[Target]) -> AuditCtx<'_> {
        let (mut t, mut x) = (targets.to_vec(), excludes.to_vec());
        t.sort();
        t.dedup();
        x.sort();
        x.dedup();
        let plan = plan.map(|p| p.display().to_string());
        let id = operation_id(kind, mode, plan.as_deref(), &t, &x);
        AuditCtx::new(&self.facts as &dyn FactsEmitter, id.to_string(), now_iso(), self.redact)
    }

    /// Open `path` as a saved plan. A directory yields `None` with an error
    /// pointing at `-chdir`.
    pub fn load_plan_file(&self, path: &Path) -> (Option<WrappedPlanFile>, Diagnostics) {
        let ctx = self.ctx("plan_file", PlanMode::Normal, Some(path), &[], &[]);
        plan_file::load(self, &ctx, path)
    }

    /// Pick the backend for an operation.
    ///
    /// # Errors
    /// Returns the resolver's diagnostics.
    pub fn resolve_backend(&self, plan: Option<&WrappedPlanFile>) -> Result<Resolved, Diagnostics> {
        let ctx = self.ctx("backend", PlanMode::Normal, plan.map(WrappedPlanFile::path), &[], &[]);
        backend::resolve(self, &ctx, plan)
    }

    /// `init`: record the declared backend for later runs.
    ///
    /// # Errors
    /// Returns the resolver's diagnostics.
    pub fn init_backend(&self) -> Result<Resolved, Diagnostics> {
        let ctx = self.ctx("init", PlanMode::Normal, None, &[], &[]);
        backend::initialize(self, &ctx)
    }

    /// Dependency locks of the root module, annotated with overrides.
    pub fn load_dependency_locks(&self) -> (Locks, Diagnostics) {
        let ctx = self.ctx("depsfile", PlanMode::Normal, None, &[], &[]);
        operation::load_locks(self, &ctx)
    }

    /// Replace the root module's dependency lock file.
    ///
    /// # Errors
    /// Returns `ApiError::Io` if the file cannot be written.
    pub fn write_dependency_locks(&self, locks: &Locks) -> Result<(), ApiError> {
        operation::save_locks(self, locks)
    }

    pub fn apply(&self, cmd: &ApplyCommand) -> OperationOutcome {
        let mode = if cmd.destroy { PlanMode::Destroy } else { PlanMode::Normal };
        let ctx = self.ctx("apply", mode, cmd.plan_path.as_deref(), &cmd.targets, &cmd.excludes);
        self.audit.log(Level::Info, if cmd.destroy { "destroy: starting" } else { "apply: starting" });
        apply::run(self, &ctx, cmd)
    }

    pub fn plan(&self, cmd: &PlanCommand) -> OperationOutcome {
        let ctx = self.ctx("plan", cmd.mode, None, &cmd.targets, &cmd.excludes);
        self.audit.log(Level::Info, "plan: starting");
        plan::run(self, &ctx, cmd)
    }

    pub fn refresh(&self, cmd: &RefreshCommand) -> OperationOutcome {
        let ctx = self.ctx("refresh", PlanMode::RefreshOnly, None, &cmd.targets, &cmd.excludes);
        self.audit.log(Level::Info, "refresh: starting");
        apply::refresh(self, &ctx, cmd)
    }
}
