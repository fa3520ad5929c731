use crate::engine::PlanRequest;
use crate::operation::{OperationOutcome, OperationResult, StopSignal};
use crate::types::diagnostics::Diagnostic;
use crate::types::plan::PlanMode;
use crate::types::state::State;

use super::{LocalRun, Waited};

/// Refresh-only: reconcile state with real objects, change nothing.
pub(super) fn run(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    run.locked(|| refresh_locked(run, sig))
}

fn refresh_locked(run: &LocalRun, sig: &StopSignal) -> OperationOutcome {
    let op = &run.op;
    let prior = match run.read_state() {
        Ok(s) => s,
        Err(d) => return OperationOutcome::failure(d),
    };
    let mut warnings = Vec::new();
    if prior.as_ref().map_or(true, State::is_empty) {
        warnings.push(Diagnostic::warning(
            "Empty or non-existent state",
            "There are currently no remote objects tracked in the state, so there is nothing to refresh.",
        ));
    }
    let targets = op.targets().to_vec();
    let excludes = op.excludes().to_vec();
    let parallelism = op.parallelism();
    let hooks = op.hooks().to_vec();
    let engine_prior = prior.unwrap_or_else(State::new);
    let waited = run.wait_engine(sig, move |engine| {
        let req = PlanRequest {
            mode: PlanMode::RefreshOnly,
            prior: &engine_prior,
            targets: &targets,
            excludes: &excludes,
            parallelism,
        };
        let (plan, mut diags) = engine.plan(&req);
        match plan {
            Some(p) if !diags.has_errors() => {
                let (state, apply_diags) = engine.apply(&p, &engine_prior, &hooks, parallelism);
                diags.extend(apply_diags);
                (state, diags)
            }
            _ => (None, diags),
        }
    });
    let (new_state, mut diags) = match waited {
        Waited::Done(v) => v,
        other => return LocalRun::unfinished(&other),
    };
    for w in warnings {
        diags.push(w);
    }
    let written = new_state.and_then(|s| run.persist(&s, &mut diags));
    let outputs = written.as_ref().map(|s| s.outputs.clone()).unwrap_or_default();
    OperationOutcome {
        result: if diags.has_errors() {
            OperationResult::Failure
        } else {
            OperationResult::Success
        },
        diags,
        state: written,
        outputs,
        ..OperationOutcome::default()
    }
}
