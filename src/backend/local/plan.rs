use crate::engine::PlanRequest;
use crate::operation::{OperationOutcome, OperationResult, StopSignal};
use crate::planfile;
use crate::types::diagnostics::{DiagClass, Diagnostic};
use crate::types::state::State;

use super::{LocalRun, Waited};

pub(super) fn run(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    if let Some(out) = run.require_config(
        "Plan",
        "Planning",
        "If you would like to destroy everything, run plan with the -destroy option.",
    ) {
        return out;
    }
    run.locked(|| plan_locked(run, sig))
}

fn plan_locked(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    let op = &run.op;
    let prior = match run.read_state() {
        Ok(s) => s,
        Err(d) => return OperationOutcome::failure(d),
    };
    let targets = op.targets().to_vec();
    let excludes = op.excludes().to_vec();
    let (mode, parallelism) = (op.mode(), op.parallelism());
    let engine_prior = prior.clone().unwrap_or_else(State::new);
    let waited = run.wait_engine(sig, move |engine| {
        engine.plan(&PlanRequest {
            mode,
            prior: &engine_prior,
            targets: &targets,
            excludes: &excludes,
            parallelism,
        })
    });
    let (plan, mut diags) = match waited {
        Waited::Done(v) => v,
        other => return LocalRun::unfinished(&other),
    };
    let Some(mut plan) = plan else {
        return OperationOutcome::failure(diags);
    };
    plan.mode = mode;
    plan.backend = Some(run.backend.clone());
    plan.prior_lineage = prior.as_ref().map(|s| s.lineage.clone());
    plan.prior_serial = prior.as_ref().map(|s| s.serial);
    plan.targets = op.targets().iter().map(ToString::to_string).collect();
    plan.excludes = op.excludes().iter().map(ToString::to_string).collect();
    if diags.has_errors() {
        plan.errored = true;
    }
    op.view().plan(&plan);

    if let Some(out) = op.plan_out() {
        if let Err(e) = planfile::create_local(out, &plan, op.encryption().as_ref()) {
            diags.push(Diagnostic::error(
                DiagClass::Generic,
                "Failed to write plan file",
                format!("The plan file could not be written: {}.", e.msg),
            ));
        } else if plan.errored {
            diags.push(Diagnostic::warning(
                "Saved plan is incomplete",
                "The plan file was written for inspection only; OpenTofu will refuse to apply it.",
            ));
        }
    }

    OperationOutcome {
        result: if diags.has_errors() {
            OperationResult::Failure
        } else {
            OperationResult::Success
        },
        plan_has_changes: plan.has_changes(),
        diags,
        ..OperationOutcome::default()
    }
}
