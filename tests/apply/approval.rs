use std::sync::Arc;

use opcore::config::Settings;
use opcore::operation::OperationResult;
use opcore::types::plan::PlanMode;
use opcore::ApplyCommand;

use crate::common::{RecordingView, ScriptedEngine, ScriptedPrompt, TestAudit, TestEmitter};

fn api_with_prompt(
    dir: &std::path::Path,
    answer: &'static str,
    view: Arc<RecordingView>,
) -> opcore::OpCore<TestEmitter, TestAudit> {
    opcore::OpCore::new(
        TestEmitter::default(),
        TestAudit,
        Settings::for_dir(dir),
        Arc::new(ScriptedEngine),
    )
    .with_view(view)
    .with_prompt(Arc::new(ScriptedPrompt(answer)))
}

#[test]
fn yes_applies() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let api = api_with_prompt(td.path(), "yes", view.clone());
    let out = api.apply(&ApplyCommand::default());
    assert_eq!(out.result, OperationResult::Success, "{}", view.all_text());
    assert_eq!(out.counts.added, 1);
    assert_eq!(view.plans.lock().unwrap().len(), 1);
}

#[test]
fn anything_but_yes_declines_without_writing_state() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let api = api_with_prompt(td.path(), "y", view.clone());
    let out = api.apply(&ApplyCommand::default());

    assert_eq!(out.result, OperationResult::DeclinedApproval);
    assert_eq!(out.exit_code(false), 1);
    assert_eq!(*view.cancelled.lock().unwrap(), vec![PlanMode::Normal]);
    assert!(!td.path().join("terraform.tfstate").exists());
}

#[test]
fn disabled_input_requires_auto_approve() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let api = opcore::OpCore::new(
        TestEmitter::default(),
        TestAudit,
        Settings::automation_preset(td.path()),
        Arc::new(ScriptedEngine),
    )
    .with_view(view.clone());
    let out = api.apply(&ApplyCommand::default());

    assert_eq!(out.exit_code(false), 1);
    assert!(view.all_text().contains("Approval required"));
}
