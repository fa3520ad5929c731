use std::sync::Arc;

use opcore::config::Settings;
use opcore::PlanCommand;

use crate::common::{opcore_for, seed_state, RecordingView};

#[test]
fn changes_exit_two_with_detailed_exitcode() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.plan(&PlanCommand::default());

    assert!(out.result.is_success(), "{}", view.all_text());
    assert!(out.plan_has_changes);
    assert_eq!(out.exit_code(true), 2);
    assert_eq!(out.exit_code(false), 0);
    assert_eq!(view.plans.lock().unwrap().len(), 1);
    // Planning never creates state.
    assert!(!td.path().join("terraform.tfstate").exists());
    assert_eq!(facts.find("operation.result")[0].1["plan_has_changes"], true);
}

#[test]
fn no_changes_exit_zero() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let before = std::fs::read(td.path().join("terraform.tfstate")).unwrap();
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.plan(&PlanCommand::default());

    assert!(out.result.is_success(), "{}", view.all_text());
    assert_eq!(out.exit_code(true), 0);
    assert_eq!(std::fs::read(td.path().join("terraform.tfstate")).unwrap(), before);
}
