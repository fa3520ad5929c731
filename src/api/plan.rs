use crate::api::operation::Intent;
use crate::api::run::drive;
use crate::api::{OpCore, PlanCommand};
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter};
use crate::operation::{OperationOutcome, OperationType};
use crate::types::diagnostics::Diagnostics;

pub(super) fn run<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    cmd: &PlanCommand,
) -> OperationOutcome {
    let intent = Intent {
        op_type: OperationType::Plan,
        mode: cmd.mode,
        targets: &cmd.targets,
        excludes: &cmd.excludes,
        auto_approve: false,
        plan_file: None,
        plan_out: cmd.out.clone(),
        workspace: String::new(),
    };
    // The backend renders the plan itself.
    drive(api, ctx, intent, Diagnostics::new(), |_, _| {})
}
