use std::sync::Arc;
use std::time::Duration;

use opcore::config::Settings;
use opcore::encryption::Disabled;
use opcore::statemgr::{Filesystem, LockInfo, StateMgr};
use opcore::ApplyCommand;

use crate::common::{opcore_for, seed_state, RecordingView};

fn holder(dir: &std::path::Path) -> Filesystem {
    Filesystem::new(dir.join("terraform.tfstate"), None, None, Arc::new(Disabled))
}

fn destroy() -> ApplyCommand {
    ApplyCommand {
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    }
}

#[test]
fn held_lock_fails_fast_and_leaves_state_intact() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let before = std::fs::read(td.path().join("terraform.tfstate")).unwrap();

    let other = holder(td.path());
    let mut info = LockInfo::new("OperationTypeApply");
    info.who = "someone@elsewhere".into();
    let id = other.lock(&info).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&destroy());

    assert_ne!(out.exit_code(false), 0);
    let text = view.all_text();
    assert!(text.contains("Error acquiring the state lock"));
    assert!(text.contains("lock"));
    assert!(text.contains("someone@elsewhere"));
    assert_eq!(std::fs::read(td.path().join("terraform.tfstate")).unwrap(), before);
    assert!(!td.path().join("terraform.tfstate.backup").exists());

    let acquire = facts.find("lock.acquire");
    assert_eq!(acquire.len(), 1);
    assert_eq!(acquire[0].0, "failure");
    assert_eq!(acquire[0].1["error_id"], "E_LOCKING");
    assert!(facts.find("lock.release").is_empty());

    let result = facts.find("operation.result");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].1["error_id"], "E_LOCKING");

    other.unlock(&id).unwrap();
}

#[test]
fn waits_for_holder_within_timeout() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());

    let other = Arc::new(holder(td.path()));
    let id = other.lock(&LockInfo::new("OperationTypePlan")).unwrap();
    let releaser = {
        let other = other.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            other.unlock(&id).unwrap();
        })
    };

    let mut settings = Settings::for_dir(td.path());
    settings.locking.timeout = Duration::from_secs(10);
    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), settings);
    let out = api.apply(&destroy());
    releaser.join().unwrap();

    assert!(out.result.is_success(), "{}", view.all_text());
    let messages = view.messages.lock().unwrap();
    assert_eq!(
        messages.iter().filter(|m| m.starts_with("Acquiring state lock")).count(),
        1
    );
    let acquire = facts.find("lock.acquire");
    assert_eq!(acquire[0].0, "success");
    assert!(acquire[0].1["lock_attempts"].as_u64().unwrap() > 1);
    // Redacted facts drop timings.
    assert!(acquire[0].1.get("lock_wait_ms").is_none());
    assert_eq!(facts.find("lock.release")[0].0, "success");
}
