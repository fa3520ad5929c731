use std::path::PathBuf;
use std::sync::Arc;

use opcore::config::Settings;
use opcore::operation::OperationResult;
use opcore::views::SummaryKind;
use opcore::ApplyCommand;

use crate::common::{opcore_for, read_state, seed_state, RecordingView};

fn destroy() -> ApplyCommand {
    ApplyCommand {
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    }
}

#[test]
fn destroy_auto_approve_empties_state_and_keeps_backup() {
    let td = tempfile::tempdir().unwrap();
    let prior = seed_state(td.path());
    let original = std::fs::read(td.path().join("terraform.tfstate")).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&destroy());

    assert_eq!(out.result, OperationResult::Success, "{}", view.all_text());
    assert_eq!(out.exit_code(false), 0);
    let after = read_state(&td.path().join("terraform.tfstate"));
    assert!(after.resources.is_empty());
    assert_eq!(after.lineage, prior.lineage);
    assert_eq!(after.serial, prior.serial + 1);

    let backup = std::fs::read(td.path().join("terraform.tfstate.backup")).unwrap();
    assert_eq!(backup, original);

    let summaries = view.summaries.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].0, SummaryKind::Destroy);
    assert_eq!(summaries[0].1.destroyed, 1);
}

#[test]
fn disabled_backup_writes_no_backup_file() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());

    let mut settings = Settings::for_dir(td.path());
    settings.paths.backup = Some(PathBuf::from("-"));
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), settings);
    let out = api.apply(&destroy());

    assert!(out.result.is_success(), "{}", view.all_text());
    assert!(!td.path().join("terraform.tfstate.backup").exists());
    assert!(read_state(&td.path().join("terraform.tfstate")).resources.is_empty());
}

#[test]
fn lock_info_file_is_gone_after_apply() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view, Settings::for_dir(td.path()));
    let _ = api.apply(&destroy());
    assert!(!td.path().join(".terraform.tfstate.lock.info").exists());
}

#[test]
fn state_out_leaves_input_untouched() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let original = std::fs::read(td.path().join("terraform.tfstate")).unwrap();

    let mut settings = Settings::for_dir(td.path());
    settings.paths.state_out = Some(td.path().join("next.tfstate"));
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view.clone(), settings);
    let out = api.apply(&destroy());

    assert!(out.result.is_success(), "{}", view.all_text());
    assert_eq!(std::fs::read(td.path().join("terraform.tfstate")).unwrap(), original);
    assert!(read_state(&td.path().join("next.tfstate")).resources.is_empty());
}
