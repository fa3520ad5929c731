use crate::api::operation::Intent;
use crate::api::run::{drive, early_failure};
use crate::api::{plan_file, ApplyCommand, OpCore, RefreshCommand};
use crate::backend::Backend;
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter};
use crate::operation::builder::destroy_with_plan_diag;
use crate::operation::{OperationOutcome, OperationType};
use crate::types::diagnostics::Diagnostics;
use crate::types::plan::PlanMode;
use crate::views::SummaryKind;

// Remote runs print their own summary.
fn renders_locally(backend: &dyn Backend) -> bool {
    backend
        .remote_reporter()
        .present()
        .map_or(true, |r| r.is_local_operations())
}

pub(super) fn run<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    cmd: &ApplyCommand,
) -> OperationOutcome {
    let mut diags = Diagnostics::new();
    let plan_file = match &cmd.plan_path {
        Some(path) => {
            let (pf, d) = plan_file::load(api, ctx, path);
            diags.extend(d);
            match pf {
                Some(pf) => Some(pf),
                None => return early_failure(api, ctx, diags),
            }
        }
        None => None,
    };
    if cmd.destroy {
        if let Some(pf) = &plan_file {
            diags.push(destroy_with_plan_diag(&pf.path().display().to_string()));
            return early_failure(api, ctx, diags);
        }
    }

    let mode = if cmd.destroy { PlanMode::Destroy } else { PlanMode::Normal };
    let intent = Intent {
        op_type: OperationType::Apply,
        mode,
        targets: &cmd.targets,
        excludes: &cmd.excludes,
        auto_approve: cmd.auto_approve,
        plan_file,
        plan_out: None,
        workspace: String::new(),
    };
    drive(api, ctx, intent, diags, |backend, out| {
        if !renders_locally(backend) {
            return;
        }
        let kind = if cmd.destroy { SummaryKind::Destroy } else { SummaryKind::Apply };
        api.view.resource_count(kind, out.counts);
        api.view.outputs(&out.outputs);
    })
}

pub(super) fn refresh<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    cmd: &RefreshCommand,
) -> OperationOutcome {
    let intent = Intent {
        op_type: OperationType::Refresh,
        mode: PlanMode::RefreshOnly,
        targets: &cmd.targets,
        excludes: &cmd.excludes,
        auto_approve: true,
        plan_file: None,
        plan_out: None,
        workspace: String::new(),
    };
    drive(api, ctx, intent, Diagnostics::new(), |backend, out| {
        if renders_locally(backend) {
            api.view.outputs(&out.outputs);
        }
    })
}
