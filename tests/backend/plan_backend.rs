use std::sync::Arc;

use opcore::config::Settings;
use opcore::encryption::Disabled;
use opcore::planfile::create_local;
use opcore::types::diagnostics::DiagClass;
use opcore::types::plan::Plan;
use opcore::ApplyCommand;

use crate::common::{opcore_for, RecordingView};

#[test]
fn plan_without_backend_is_reported_as_a_bug() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("broken.tfplan");
    create_local(&path, &Plan::default(), &Disabled).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view, Settings::for_dir(td.path()));
    let (pf, diags) = api.load_plan_file(&path);
    assert!(diags.is_empty());
    let pf = pf.unwrap();

    let err = api.resolve_backend(Some(&pf)).err().unwrap();
    assert_eq!(err.error_class(), Some(DiagClass::InvariantViolation));
    let d = err.errors().next().unwrap();
    assert_eq!(d.summary, "Failed to read plan from plan file");
    assert!(d.detail.contains("This is a bug"));

    let resolves = facts.find("backend.resolve");
    assert_eq!(resolves[0].0, "failure");
    assert_eq!(resolves[0].1["error_id"], "E_INTERNAL");
}

#[test]
fn applying_such_a_plan_fails_without_touching_state() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("broken.tfplan");
    create_local(&path, &Plan::default(), &Disabled).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&ApplyCommand {
        plan_path: Some(path),
        ..ApplyCommand::default()
    });
    assert_eq!(out.exit_code(false), 1);
    assert!(view.all_text().contains("This is a bug"));
    assert!(!td.path().join("terraform.tfstate").exists());
}

#[test]
fn garbage_plan_file_is_rejected_on_load() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("junk.tfplan");
    std::fs::write(&path, b"not a plan").unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view, Settings::for_dir(td.path()));
    let (pf, diags) = api.load_plan_file(&path);
    assert!(pf.is_none());
    assert!(diags.has_errors());
    assert_eq!(facts.find("plan_file.load")[0].0, "failure");
}
