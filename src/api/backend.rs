use log::Level;
use serde_json::json;

use crate::api::errors::{id_for_diags, ErrorId};
use crate::api::OpCore;
use crate::backend::{BackendResolver, BackendSource, Resolved};
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::planfile::WrappedPlanFile;
use crate::types::diagnostics::Diagnostics;

fn source_str(s: BackendSource) -> &'static str {
    match s {
        BackendSource::Plan => "plan",
        BackendSource::Config => "config",
        BackendSource::Synthetic => "synthetic",
    }
}

fn report<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    res: Result<Resolved, Diagnostics>,
) -> Result<Resolved, Diagnostics> {
    let slog = StageLogger::new(ctx);
    match &res {
        Ok(r) => slog
            .backend_resolve()
            .field("backend_type", json!(r.record.type_name))
            .field("backend_source", json!(source_str(r.source)))
            .field("workspace", json!(r.workspace))
            .emit_success(),
        Err(d) => {
            api.audit.log(Level::Error, &format!("backend: {}", d.error_message()));
            slog.backend_resolve()
                .field("error", json!(d.error_message()))
                .error_id(id_for_diags(d).unwrap_or(ErrorId::E_BACKEND_CONFIG))
                .emit_failure();
        }
    }
    res
}

fn resolver<E: FactsEmitter, A: AuditSink>(api: &OpCore<E, A>) -> BackendResolver<'_> {
    BackendResolver::new(
        &api.registry,
        api.loader.as_ref(),
        &api.settings,
        api.encryption.clone(),
    )
}

pub(super) fn resolve<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    plan: Option<&WrappedPlanFile>,
) -> Result<Resolved, Diagnostics> {
    report(api, ctx, resolver(api).resolve(plan))
}

pub(super) fn initialize<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
) -> Result<Resolved, Diagnostics> {
    report(api, ctx, resolver(api).initialize())
}
