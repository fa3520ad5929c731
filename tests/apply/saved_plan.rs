use std::sync::Arc;

use opcore::config::Settings;
use opcore::operation::OperationResult;
use opcore::{ApplyCommand, PlanCommand};

use crate::common::{opcore_for, read_state, seed_state, RecordingView};

fn save_plan(dir: &std::path::Path) -> std::path::PathBuf {
    let out = dir.join("tfplan");
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(dir));
    let res = api.plan(&PlanCommand {
        out: Some(out.clone()),
        ..PlanCommand::default()
    });
    assert!(res.result.is_success(), "{}", view.all_text());
    assert!(out.is_file());
    out
}

#[test]
fn applies_saved_plan_without_prompting() {
    let td = tempfile::tempdir().unwrap();
    let plan_path = save_plan(td.path());

    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&ApplyCommand {
        plan_path: Some(plan_path),
        ..ApplyCommand::default()
    });

    assert_eq!(out.result, OperationResult::Success, "{}", view.all_text());
    let st = read_state(&td.path().join("terraform.tfstate"));
    assert!(st.resources.contains_key("null_resource.a"));
    assert_eq!(st.serial, 1);
}

#[test]
fn stale_plan_is_rejected_and_state_kept() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let plan_path = save_plan(td.path());

    // Another run replaced the state after planning.
    seed_state(td.path());
    let before = std::fs::read(td.path().join("terraform.tfstate")).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&ApplyCommand {
        plan_path: Some(plan_path),
        ..ApplyCommand::default()
    });

    assert_eq!(out.exit_code(false), 1);
    assert!(view.all_text().contains("Saved plan is stale"));
    assert_eq!(std::fs::read(td.path().join("terraform.tfstate")).unwrap(), before);
}

#[test]
fn destroy_with_plan_file_is_rejected_before_backend_resolution() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let plan_path = save_plan(td.path());
    let before = std::fs::read(td.path().join("terraform.tfstate")).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&ApplyCommand {
        plan_path: Some(plan_path),
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    });

    assert_eq!(out.exit_code(false), 1);
    let text = view.all_text();
    assert!(text.contains("Destroy can't be called with a plan file"));
    assert!(text.contains("plan file"));
    assert!(facts.find("backend.resolve").is_empty());
    assert_eq!(std::fs::read(td.path().join("terraform.tfstate")).unwrap(), before);
}

#[test]
fn directory_as_plan_path_points_at_chdir() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&ApplyCommand {
        plan_path: Some(td.path().to_path_buf()),
        ..ApplyCommand::default()
    });

    assert_eq!(out.exit_code(false), 1);
    let d = out.diags.errors().next().unwrap().clone();
    assert!(d.summary.contains("as a plan file"));
    assert!(d.detail.contains("-chdir"));
    let loads = facts.find("plan_file.load");
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].0, "failure");
    assert_eq!(loads[0].1["error_id"], "E_USER_INPUT");
}
