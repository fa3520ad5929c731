use std::sync::Arc;

use opcore::config::Settings;
use opcore::ApplyCommand;

use crate::common::{opcore_for, read_state, seed_state, RecordingView};

#[test]
fn lock_false_skips_locking_entirely() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let mut settings = Settings::for_dir(td.path());
    settings.locking.enabled = false;

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), settings);
    let out = api.apply(&ApplyCommand {
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    });

    assert!(out.result.is_success(), "{}", view.all_text());
    assert!(read_state(&td.path().join("terraform.tfstate")).resources.is_empty());
    assert!(facts.find("lock.acquire").is_empty());
    assert_eq!(facts.find("operation.start")[0].1["locking"], false);
}
