use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::api::errors::{id_for_diags, ErrorId};
use crate::api::operation::{self, Intent};
use crate::api::{backend, OpCore};
use crate::backend::Backend;
use crate::constants::{CANCEL_GRACE_MS, OPERATION_POLL_MS};
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::operation::{Operation, OperationOutcome, OperationResult, RunningOperation};
use crate::statelock::RELEASE_FAILED;
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};

const STOP_NOTICE: &str = "Interrupt received.\n\
Please wait for OpenTofu to exit or data loss may occur.\n\
Gracefully shutting down...";

const CANCEL_NOTICE: &str =
    "Two interrupts received. Exiting immediately. Note that data loss may have occurred.";

/// Resolve the backend, load locks, build the operation and run it.
/// `summary` renders command-specific output after a successful run.
pub(super) fn drive<E, A, F>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    mut intent: Intent<'_>,
    mut diags: Diagnostics,
    summary: F,
) -> OperationOutcome
where
    E: FactsEmitter,
    A: AuditSink,
    F: FnOnce(&dyn Backend, &OperationOutcome),
{
    let resolved = match backend::resolve(api, ctx, intent.plan_file.as_ref()) {
        Ok(r) => r,
        Err(d) => {
            diags.extend(d);
            return early_failure(api, ctx, diags);
        }
    };
    diags.extend(resolved.warnings);
    intent.workspace = resolved.workspace;

    let (locks, lock_diags) = operation::load_locks(api, ctx);
    let locks_failed = lock_diags.has_errors();
    diags.extend(lock_diags);
    if locks_failed {
        return early_failure(api, ctx, diags);
    }

    let (op, warnings) = match operation::build(api, intent, locks) {
        Ok(built) => built,
        Err(d) => {
            diags.extend(d);
            return early_failure(api, ctx, diags);
        }
    };
    diags.extend(warnings);

    let mut outcome = execute(api, ctx, resolved.backend.as_ref(), op, &diags);
    if outcome.result.is_success() {
        summary(resolved.backend.as_ref(), &outcome);
    }
    if !outcome.diags.is_empty() {
        api.view.diagnostics(&outcome.diags);
    }
    diags.extend(std::mem::take(&mut outcome.diags));
    outcome.diags = diags;
    outcome
}

/// Render `diags` and report a failure before any operation started.
pub(super) fn early_failure<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    diags: Diagnostics,
) -> OperationOutcome {
    api.view.diagnostics(&diags);
    let out = OperationOutcome::failure(diags);
    result_fact(&StageLogger::new(ctx), &out);
    out
}

/// Start `op` on `backend` and wait for it, forwarding interrupts.
pub(super) fn execute<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    backend: &dyn Backend,
    op: Operation,
    warnings: &Diagnostics,
) -> OperationOutcome {
    let slog = StageLogger::new(ctx);
    if !warnings.is_empty() {
        api.view.diagnostics(warnings);
    }
    let op = Arc::new(op);
    slog.operation_start()
        .field("operation", json!(op.op_type().as_str()))
        .field("mode", json!(op.mode()))
        .field("backend_type", json!(backend.type_name()))
        .field("workspace", json!(op.workspace()))
        .field("operation_uuid", json!(op.id().to_string()))
        .field("locking", json!(op.state_locker().enabled()))
        .emit_success();

    let outcome = match backend.operation(op) {
        Ok(running) => wait(api, &running),
        Err(diags) => OperationOutcome::failure(diags),
    };

    lock_facts(&slog, &outcome);
    result_fact(&slog, &outcome);
    outcome
}

fn wait<E: FactsEmitter, A: AuditSink>(api: &OpCore<E, A>, running: &RunningOperation) -> OperationOutcome {
    let poll = Duration::from_millis(OPERATION_POLL_MS);
    let mut seen = 0;
    loop {
        if let Some(out) = running.wait_timeout(poll) {
            return out;
        }
        let n = api.interrupts.count();
        if n == seen {
            continue;
        }
        if seen == 0 {
            api.view.message(STOP_NOTICE);
            running.stop();
        }
        seen = n;
        if n >= 2 {
            api.view.message(CANCEL_NOTICE);
            running.cancel();
            return running
                .wait_timeout(Duration::from_millis(CANCEL_GRACE_MS))
                .unwrap_or_else(abandoned);
        }
    }
}

// Worker did not report within the grace period after cancellation.
fn abandoned() -> OperationOutcome {
    OperationOutcome {
        result: OperationResult::Cancelled,
        diags: Diagnostics::new().with(Diagnostic::error(
            DiagClass::Interrupted,
            "Operation cancelled",
            "The operation did not stop in time after a second interrupt. The state may be locked and incomplete.",
        )),
        ..OperationOutcome::default()
    }
}

fn lock_facts(slog: &StageLogger<'_>, out: &OperationOutcome) {
    let Some(report) = &out.lock else { return };
    // Locking disabled: nothing was attempted.
    if report.attempts == 0 {
        return;
    }
    let acquire = slog
        .lock_acquire()
        .field("lock_backend", json!(report.backend))
        .field("lock_attempts", json!(report.attempts))
        .field("lock_wait_ms", json!(report.wait_ms));
    if !report.acquired {
        acquire.error_id(ErrorId::E_LOCKING).emit_failure();
        return;
    }
    acquire.emit_success();

    let release = slog.lock_release().field("lock_backend", json!(report.backend));
    if out.diags.errors().any(|d| d.summary == RELEASE_FAILED) {
        release.error_id(ErrorId::E_LOCKING).emit_failure();
    } else {
        release.emit_success();
    }
}

fn result_fact(slog: &StageLogger<'_>, out: &OperationOutcome) {
    let result = match out.result {
        OperationResult::Success => "success",
        OperationResult::Failure => "failure",
        OperationResult::DeclinedApproval => "declined",
        OperationResult::Cancelled => "cancelled",
    };
    let ev = slog
        .operation_result()
        .field("result", json!(result))
        .field("exit_code", json!(out.exit_code(false)))
        .field("plan_has_changes", json!(out.plan_has_changes))
        .field("resources_added", json!(out.counts.added))
        .field("resources_changed", json!(out.counts.changed))
        .field("resources_destroyed", json!(out.counts.destroyed));
    match out.result {
        OperationResult::Success => ev.emit_success(),
        OperationResult::DeclinedApproval => ev.emit_warn(),
        OperationResult::Cancelled => ev
            .error_id(id_for_diags(&out.diags).unwrap_or(ErrorId::E_INTERRUPTED))
            .emit_failure(),
        OperationResult::Failure => ev
            .error_id(id_for_diags(&out.diags).unwrap_or(ErrorId::E_GENERIC))
            .emit_failure(),
    }
}
