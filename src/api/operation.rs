use std::sync::Arc;

use log::Level;
use serde_json::json;

use crate::api::errors::{ApiError, ErrorId};
use crate::api::OpCore;
use crate::depsfile::{DependencyLockStore, Locks};
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::operation::{Operation, OperationBuilder, OperationType};
use crate::planfile::WrappedPlanFile;
use crate::statelock::{NoopLocker, StateLocker, TimedLocker};
use crate::types::addrs::Target;
use crate::types::diagnostics::Diagnostics;
use crate::types::plan::PlanMode;

pub(super) fn load_locks<E: FactsEmitter, A: AuditSink>(api: &OpCore<E, A>, ctx: &AuditCtx<'_>) -> (Locks, Diagnostics) {
    let store = DependencyLockStore::new(api.settings.config_dir.clone()).with_overrides(api.overrides.clone());
    let (locks, diags) = store.load_annotated();
    let ev = StageLogger::new(ctx)
        .depsfile_load()
        .path(store.path().display().to_string())
        .field("providers", json!(locks.all_providers().len()))
        .field("overridden", json!(locks.overridden_providers().len()));
    if diags.has_errors() {
        ev.field("error", json!(diags.error_message()))
            .error_id(ErrorId::E_BACKEND_CONFIG)
            .emit_failure();
    } else if diags.warnings().next().is_some() {
        ev.field("migrated", json!(true)).emit_warn();
    } else {
        ev.emit_success();
    }
    (locks, diags)
}

pub(super) fn save_locks<E: FactsEmitter, A: AuditSink>(api: &OpCore<E, A>, locks: &Locks) -> Result<(), ApiError> {
    let store = DependencyLockStore::new(api.settings.config_dir.clone());
    store.replace(locks).map_err(|e| {
        api.audit.log(Level::Error, &format!("depsfile {}: {}", store.path().display(), e.msg));
        ApiError::from(e)
    })
}

fn state_locker<E: FactsEmitter, A: AuditSink>(api: &OpCore<E, A>) -> Arc<dyn StateLocker> {
    if api.settings.locking.enabled {
        Arc::new(
            TimedLocker::new(api.settings.locking.timeout)
                .with_view(api.view.clone())
                .with_interrupts(api.interrupts.clone()),
        )
    } else {
        Arc::new(NoopLocker)
    }
}

/// Caller intent common to all commands.
pub(super) struct Intent<'a> {
    pub op_type: OperationType,
    pub mode: PlanMode,
    pub targets: &'a [Target],
    pub excludes: &'a [Target],
    pub auto_approve: bool,
    pub plan_file: Option<WrappedPlanFile>,
    pub plan_out: Option<std::path::PathBuf>,
    pub workspace: String,
}

/// Assemble the operation. On success the returned diagnostics are the
/// warnings to flush before the backend starts.
pub(super) fn build<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    intent: Intent<'_>,
    locks: Locks,
) -> Result<(Operation, Diagnostics), Diagnostics> {
    let dir = &api.settings.config_dir;
    let mut b = OperationBuilder::new(intent.op_type, dir.clone())
        .mode(intent.mode)
        .has_config(api.loader.has_config(dir))
        .targets(intent.targets.to_vec())
        .excludes(intent.excludes.to_vec())
        .parallelism(api.settings.runtime.parallelism)
        .auto_approve(intent.auto_approve)
        .plan_file(intent.plan_file)
        .plan_out(intent.plan_out)
        .workspace(intent.workspace)
        .locks(locks, api.overrides.clone())
        .required_providers(api.loader.required_providers(dir))
        .running_in_automation(api.settings.runtime.running_in_automation)
        .state_locker(state_locker(api))
        .view(api.view.clone())
        .prompt(api.prompt.clone(), api.settings.runtime.input_enabled)
        .encryption(api.encryption.clone())
        .engine(api.engine.clone());
    for h in &api.hooks {
        b = b.hook(h.clone());
    }
    b.build()
}
