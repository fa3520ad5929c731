use std::path::PathBuf;
use std::sync::Arc;

use opcore::config::Settings;
use opcore::engine::{CoreEngine, PlanRequest};
use opcore::operation::OperationResult;
use opcore::statelock::RELEASE_FAILED;
use opcore::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use opcore::types::plan::Plan;
use opcore::types::state::State;
use opcore::views::Hook;
use opcore::OpCoreBuilder;
use opcore::ApplyCommand;

use crate::common::{seed_state, RecordingView, ScriptedEngine, TestAudit, TestEmitter};

/// Fails `apply` after putting a directory where the lock info file was,
/// so the lock can no longer be released cleanly.
struct SabotagingEngine {
    lock_info: PathBuf,
}

impl CoreEngine for SabotagingEngine {
    fn plan(&self, req: &PlanRequest<'_>) -> (Option<Plan>, Diagnostics) {
        ScriptedEngine.plan(req)
    }

    fn apply(&self, _plan: &Plan, _prior: &State, _hooks: &[Arc<dyn Hook>], _parallelism: usize) -> (Option<State>, Diagnostics) {
        std::fs::remove_file(&self.lock_info).unwrap();
        std::fs::create_dir(&self.lock_info).unwrap();
        std::fs::write(self.lock_info.join("keep"), b"x").unwrap();
        let diags = Diagnostics::new().with(Diagnostic::error(
            DiagClass::Backend,
            "Provider produced an error",
            "delete failed",
        ));
        (None, diags)
    }

    fn stop(&self) {}
}

#[test]
fn release_error_is_reported_after_a_failed_apply() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let lock_info = td.path().join(".terraform.tfstate.lock.info");

    let view = Arc::new(RecordingView::default());
    let facts = TestEmitter::default();
    let engine = Arc::new(SabotagingEngine { lock_info: lock_info.clone() });
    let api = OpCoreBuilder::new(facts.clone(), TestAudit, Settings::for_dir(td.path()), engine)
        .view(view.clone())
        .redact(true)
        .build();
    let out = api.apply(&ApplyCommand {
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    });

    assert_eq!(out.result, OperationResult::Failure);
    let summaries: Vec<&str> = out.diags.errors().map(|d| d.summary.as_str()).collect();
    assert!(summaries.contains(&"Provider produced an error"), "{summaries:?}");
    assert!(summaries.contains(&RELEASE_FAILED), "{summaries:?}");
    assert!(view.all_text().contains(RELEASE_FAILED));

    let acquire = facts.find("lock.acquire");
    assert_eq!(acquire[0].0, "success");
    let release = facts.find("lock.release");
    assert_eq!(release.len(), 1);
    assert_eq!(release[0].0, "failure");
    assert_eq!(release[0].1["error_id"], "E_LOCKING");

    // The primary failure still classifies the result.
    assert_eq!(facts.find("operation.result")[0].1["error_id"], "E_BACKEND");

    std::fs::remove_dir_all(&lock_info).unwrap();
}
