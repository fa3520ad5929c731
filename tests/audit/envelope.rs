use std::sync::Arc;

use serde_json::Value;

use opcore::config::Settings;
use opcore::logging::TS_ZERO;
use opcore::types::addrs::Target;
use opcore::ApplyCommand;

use crate::common::{opcore_for, seed_state, RecordingView, TestEmitter};

fn destroy_targeting(targets: &[&str]) -> ApplyCommand {
    ApplyCommand {
        destroy: true,
        auto_approve: true,
        targets: targets.iter().map(|t| Target::parse(t).unwrap()).collect(),
        ..ApplyCommand::default()
    }
}

fn run(targets: &[&str]) -> TestEmitter {
    let td = tempfile::tempdir().unwrap();
    seed_state(td.path());
    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view.clone(), Settings::for_dir(td.path()));
    let out = api.apply(&destroy_targeting(targets));
    assert!(out.result.is_success(), "{}", view.all_text());
    facts
}

#[test]
fn every_fact_carries_the_envelope() {
    let facts = run(&["null_resource.a"]);
    let events = facts.events.lock().unwrap();
    let stages: Vec<&str> = events.iter().map(|(_, e, _, _)| e.as_str()).collect();
    assert_eq!(
        stages,
        vec![
            "backend.resolve",
            "depsfile.load",
            "operation.start",
            "lock.acquire",
            "lock.release",
            "operation.result",
        ]
    );
    let op_id = events[0].3["operation_id"].clone();
    for (subsystem, event, decision, fields) in events.iter() {
        assert_eq!(subsystem, "opcore");
        assert_eq!(fields["stage"], Value::from(event.as_str()));
        assert_eq!(fields["decision"], Value::from(decision.as_str()));
        assert_eq!(fields["schema_version"], 1);
        assert_eq!(fields["ts"], TS_ZERO);
        assert_eq!(fields["operation_id"], op_id);
    }
}

#[test]
fn operation_id_is_stable_and_order_insensitive() {
    let a = run(&["null_resource.a", "null_resource.b"]);
    let b = run(&["null_resource.b", "null_resource.a", "null_resource.a"]);
    let c = run(&["null_resource.a"]);
    let id = |f: &TestEmitter| f.find("operation.result")[0].1["operation_id"].clone();
    assert_eq!(id(&a), id(&b));
    assert_ne!(id(&a), id(&c));
}

#[test]
fn result_fact_reports_counts() {
    let facts = run(&[]);
    let result = facts.find("operation.result");
    assert_eq!(result[0].0, "success");
    assert_eq!(result[0].1["exit_code"], 0);
    assert_eq!(result[0].1["resources_destroyed"], 1);
    assert!(result[0].1.get("error_id").is_none());
}
