use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use opcore::config::Settings;
use opcore::encryption::Disabled;
use opcore::engine::{CoreEngine, PlanRequest};
use opcore::interrupt::InterruptContext;
use opcore::operation::OperationResult;
use opcore::statemgr::{Filesystem, LockInfo, StateMgr};
use opcore::types::diagnostics::Diagnostics;
use opcore::types::plan::Plan;
use opcore::types::state::State;
use opcore::views::Hook;
use opcore::{ApplyCommand, OpCoreBuilder};

use crate::common::{read_state, seed_state, RecordingView, ScriptedEngine, TestAudit, TestEmitter};

/// Plans like the scripted engine but blocks in `apply`, ignoring stop
/// requests, until `release` is set.
#[derive(Default)]
struct StuckEngine {
    started: AtomicBool,
    release: AtomicBool,
}

impl CoreEngine for StuckEngine {
    fn plan(&self, req: &PlanRequest<'_>) -> (Option<Plan>, Diagnostics) {
        ScriptedEngine.plan(req)
    }

    fn apply(&self, _plan: &Plan, _prior: &State, _hooks: &[Arc<dyn Hook>], _parallelism: usize) -> (Option<State>, Diagnostics) {
        self.started.store(true, Ordering::SeqCst);
        let t0 = Instant::now();
        while !self.release.load(Ordering::SeqCst) && t0.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(10));
        }
        (None, Diagnostics::new())
    }

    fn stop(&self) {}
}

#[test]
fn second_interrupt_cancels_and_releases_the_lock() {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let state_path = td.path().join("terraform.tfstate");

    let engine = Arc::new(StuckEngine::default());
    let interrupts = InterruptContext::new();
    let view = Arc::new(RecordingView::default());
    let facts = TestEmitter::default();
    let api = OpCoreBuilder::new(facts.clone(), TestAudit, Settings::for_dir(td.path()), engine.clone())
        .view(view.clone())
        .interrupts(interrupts.clone())
        .redact(true)
        .build();

    let signaller = {
        let engine = engine.clone();
        thread::spawn(move || {
            let t0 = Instant::now();
            while !engine.started.load(Ordering::SeqCst) && t0.elapsed() < Duration::from_secs(10) {
                thread::sleep(Duration::from_millis(5));
            }
            interrupts.interrupt();
            thread::sleep(Duration::from_millis(100));
            interrupts.interrupt();
        })
    };

    let t0 = Instant::now();
    let out = api.apply(&ApplyCommand {
        destroy: true,
        auto_approve: true,
        ..ApplyCommand::default()
    });
    signaller.join().unwrap();
    let elapsed = t0.elapsed();
    engine.release.store(true, Ordering::SeqCst);

    assert_eq!(out.result, OperationResult::Cancelled);
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    let messages = view.messages.lock().unwrap().clone();
    assert!(messages.iter().any(|m| m.starts_with("Interrupt received.")));
    assert!(messages.iter().any(|m| m.starts_with("Two interrupts received.")));

    assert!(!td.path().join(".terraform.tfstate.lock.info").exists());
    let fresh = Filesystem::new(state_path.clone(), None, None, Arc::new(Disabled));
    let id = fresh.lock(&LockInfo::new("OperationTypeApply")).unwrap();
    fresh.unlock(&id).unwrap();

    // Nothing was persisted.
    assert!(read_state(&state_path).resources.contains_key("null_resource.a"));

    let release = facts.find("lock.release");
    assert_eq!(release.len(), 1);
    assert_eq!(release[0].0, "success");
    let result = facts.find("operation.result");
    assert_eq!(result[0].0, "failure");
    assert_eq!(result[0].1["error_id"], "E_INTERRUPTED");
}
