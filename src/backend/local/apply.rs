use std::sync::Arc;

use crate::engine::PlanRequest;
use crate::operation::{OperationOutcome, OperationResult, StopSignal};
use crate::planfile::WrappedPlanFile;
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::types::plan::{Plan, PlanMode};
use crate::types::state::State;
use crate::views::{CountHook, Hook};

use super::{LocalRun, Waited};

pub(super) fn run(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    if let Some(out) = run.require_config(
        "Apply",
        "Applying",
        "If you would like to destroy everything, run 'tofu destroy' instead.",
    ) {
        return out;
    }
    run.locked(|| apply_locked(run, sig))
}

fn failed(class: DiagClass, summary: &str, detail: String) -> OperationOutcome {
    OperationOutcome::failure(Diagnostics::new().with(Diagnostic::error(class, summary, detail)))
}

/// The saved plan, checked against the current state.
fn saved_plan(pf: &WrappedPlanFile, prior: Option<&State>) -> Result<Plan, OperationOutcome> {
    let Some(local) = pf.local() else {
        return Err(failed(
            DiagClass::Configuration,
            "Cloud plans are not supported by this backend",
            format!(
                "The plan file {} refers to a remote run, but the \"local\" backend can only apply local plans.",
                pf.path().display()
            ),
        ));
    };
    let plan = local.read_plan().map_err(|e| {
        failed(
            DiagClass::UserInput,
            "Failed to read plan from plan file",
            format!("Cannot read the plan from the given plan file: {}.", e.msg),
        )
    })?;
    if !plan.applyable() {
        return Err(failed(
            DiagClass::UserInput,
            "Cannot apply incomplete plan",
            "OpenTofu encountered an error when generating this plan, so it cannot be applied.".to_string(),
        ));
    }
    let fresh = match (&plan.prior_lineage, prior) {
        (Some(lineage), Some(st)) => *lineage == st.lineage && plan.prior_serial == Some(st.serial),
        (None, None) => true,
        _ => false,
    };
    if !fresh {
        return Err(failed(
            DiagClass::UserInput,
            "Saved plan is stale",
            "The given plan file can no longer be applied because the state was changed by another operation after the plan was created.".to_string(),
        ));
    }
    Ok(plan)
}

fn approve(run: &LocalRun, plan: &Plan) -> Option<OperationOutcome> {
    let op = &run.op;
    if op.auto_approve() || op.plan_file().is_some() || !plan.has_changes() {
        return None;
    }
    let (query, desc) = if op.mode() == PlanMode::Destroy {
        (
            "Do you really want to destroy all resources?",
            "OpenTofu will destroy all your managed infrastructure, as shown above.\nThere is no undo. Only 'yes' will be accepted to confirm.",
        )
    } else {
        (
            "Do you want to perform these actions?",
            "OpenTofu will perform the actions described above.\nOnly 'yes' will be accepted to approve.",
        )
    };
    let prompt = match op.prompt() {
        Some(p) if op.input_enabled() => p,
        _ => {
            return Some(failed(
                DiagClass::UserInput,
                "Approval required",
                "This plan requires approval, but interactive input is disabled. Re-run with -auto-approve to apply without confirmation.".to_string(),
            ))
        }
    };
    match prompt.ask(query, desc) {
        Ok(answer) if answer.trim() == "yes" => None,
        Ok(_) => {
            op.view().cancelled(op.mode());
            Some(OperationOutcome {
                result: OperationResult::DeclinedApproval,
                ..OperationOutcome::default()
            })
        }
        Err(e) => Some(failed(
            DiagClass::UserInput,
            "Error asking for approval",
            e.msg,
        )),
    }
}

fn apply_locked(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    let op = &run.op;
    let prior = match run.read_state() {
        Ok(s) => s,
        Err(d) => return OperationOutcome::failure(d),
    };
    let prior_state = prior.clone().unwrap_or_else(State::new);
    let mut diags = Diagnostics::new();

    let plan = if let Some(pf) = op.plan_file() {
        match saved_plan(pf, prior.as_ref()) {
            Ok(p) => p,
            Err(out) => return out,
        }
    } else {
        let targets = op.targets().to_vec();
        let excludes = op.excludes().to_vec();
        let (mode, parallelism, engine_prior) = (op.mode(), op.parallelism(), prior_state.clone());
        let waited = run.wait_engine(sig, move |engine| {
            engine.plan(&PlanRequest {
                mode,
                prior: &engine_prior,
                targets: &targets,
                excludes: &excludes,
                parallelism,
            })
        });
        let (plan, plan_diags) = match waited {
            Waited::Done(v) => v,
            other => return LocalRun::unfinished(&other),
        };
        diags.extend(plan_diags);
        match plan {
            Some(p) if !diags.has_errors() && !p.errored => {
                op.view().plan(&p);
                p
            }
            _ => return OperationOutcome::failure(diags),
        }
    };

    if let Some(mut out) = approve(run, &plan) {
        let mut all = diags;
        all.extend(out.diags);
        out.diags = all;
        return out;
    }

    if sig.is_stopped() {
        diags.push(Diagnostic::error(
            DiagClass::Interrupted,
            "execution halted",
            "The operation was interrupted before any changes were applied.",
        ));
        return OperationOutcome {
            result: OperationResult::Cancelled,
            diags,
            ..OperationOutcome::default()
        };
    }

    let counter = Arc::new(CountHook::default());
    let mut hooks: Vec<Arc<dyn Hook>> = op.hooks().to_vec();
    hooks.push(counter.clone());
    let parallelism = op.parallelism();
    let engine_plan = plan.clone();
    let engine_prior = prior_state;
    let waited = run.wait_engine(sig, move |engine| {
        engine.apply(&engine_plan, &engine_prior, &hooks, parallelism)
    });
    let (new_state, apply_diags) = match waited {
        Waited::Done(v) => v,
        other => {
            let mut out = LocalRun::unfinished(&other);
            diags.extend(out.diags);
            out.diags = diags;
            out.counts = counter.counts();
            return out;
        }
    };
    diags.extend(apply_diags);

    // Persist whatever came back, even after partial failure.
    let written = new_state.and_then(|s| run.persist(&s, &mut diags));
    let outputs = written.as_ref().map(|s| s.outputs.clone()).unwrap_or_default();
    OperationOutcome {
        result: if diags.has_errors() {
            OperationResult::Failure
        } else {
            OperationResult::Success
        },
        diags,
        plan_has_changes: plan.has_changes(),
        state: written,
        counts: counter.counts(),
        outputs,
        lock: None,
    }
}
