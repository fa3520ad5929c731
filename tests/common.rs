//! Shared test helpers for the opcore integration tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::Level;
use serde_json::{json, Value};

use opcore::engine::{CoreEngine, PlanRequest};
use opcore::logging::{AuditSink, FactsEmitter};
use opcore::types::diagnostics::{Diagnostic, Diagnostics};
use opcore::types::errors::Result;
use opcore::types::plan::{ChangeAction, Plan, PlanMode, ResourceChange, ResourceCounts};
use opcore::types::state::{OutputValue, State};
use opcore::views::{ApprovalPrompt, Hook, SummaryKind, View};

/// A simple in-memory emitter to capture facts during tests.
#[derive(Clone, Default, Debug)]
pub struct TestEmitter {
    pub events: Arc<Mutex<Vec<(String, String, String, Value)>>>,
}

impl FactsEmitter for TestEmitter {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value) {
        self.events
            .lock()
            .unwrap()
            .push((subsystem.into(), event.into(), decision.into(), fields));
    }
}

impl TestEmitter {
    /// Fields of every event named `event`, in emission order.
    pub fn find(&self, event: &str) -> Vec<(String, Value)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _, _)| e == event)
            .map(|(_, _, d, f)| (d.clone(), f.clone()))
            .collect()
    }
}

/// A no-op audit sink for tests.
#[derive(Clone, Default)]
pub struct TestAudit;

impl AuditSink for TestAudit {
    fn log(&self, _level: Level, _msg: &str) {}
}

/// View recording everything the core renders.
#[derive(Default)]
pub struct RecordingView {
    pub diags: Mutex<Vec<Diagnostic>>,
    pub messages: Mutex<Vec<String>>,
    pub plans: Mutex<Vec<Plan>>,
    pub summaries: Mutex<Vec<(SummaryKind, ResourceCounts)>>,
    pub cancelled: Mutex<Vec<PlanMode>>,
}

impl RecordingView {
    pub fn all_text(&self) -> String {
        let diags = self.diags.lock().unwrap();
        let mut s = String::new();
        for d in diags.iter() {
            s.push_str(&d.summary);
            s.push('\n');
            s.push_str(&d.detail);
            s.push('\n');
        }
        s
    }
}

impl View for RecordingView {
    fn diagnostics(&self, diags: &Diagnostics) {
        self.diags.lock().unwrap().extend(diags.iter().cloned());
    }

    fn message(&self, msg: &str) {
        self.messages.lock().unwrap().push(msg.to_string());
    }

    fn cancelled(&self, mode: PlanMode) {
        self.cancelled.lock().unwrap().push(mode);
    }

    fn plan(&self, plan: &Plan) {
        self.plans.lock().unwrap().push(plan.clone());
    }

    fn resource_count(&self, kind: SummaryKind, counts: ResourceCounts) {
        self.summaries.lock().unwrap().push((kind, counts));
    }

    fn outputs(&self, _outputs: &BTreeMap<String, OutputValue>) {}
}

/// Prompt answering every question with a fixed string.
pub struct ScriptedPrompt(pub &'static str);

impl ApprovalPrompt for ScriptedPrompt {
    fn ask(&self, _query: &str, _description: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Engine that manages `null_resource.a`.
///
/// Normal plans create it when absent, destroy plans delete everything in
/// the prior state, refresh plans change nothing.
#[derive(Default)]
pub struct ScriptedEngine;

impl CoreEngine for ScriptedEngine {
    fn plan(&self, req: &PlanRequest<'_>) -> (Option<Plan>, Diagnostics) {
        let changes = match req.mode {
            PlanMode::Destroy => req
                .prior
                .resources
                .keys()
                .map(|a| ResourceChange {
                    address: a.clone(),
                    action: ChangeAction::Delete,
                    after: None,
                })
                .collect(),
            PlanMode::Normal if !req.prior.resources.contains_key("null_resource.a") => {
                vec![ResourceChange {
                    address: "null_resource.a".into(),
                    action: ChangeAction::Create,
                    after: Some(json!({"id": "a"})),
                }]
            }
            _ => Vec::new(),
        };
        let plan = Plan {
            mode: req.mode,
            changes,
            ..Plan::default()
        };
        (Some(plan), Diagnostics::new())
    }

    fn apply(&self, plan: &Plan, prior: &State, hooks: &[Arc<dyn Hook>], _parallelism: usize) -> (Option<State>, Diagnostics) {
        let mut next = prior.clone();
        for c in &plan.changes {
            for h in hooks {
                h.pre_apply(&c.address, c.action);
            }
            match c.action {
                ChangeAction::Delete => {
                    next.resources.remove(&c.address);
                }
                ChangeAction::NoOp => {}
                _ => {
                    next.resources
                        .insert(c.address.clone(), c.after.clone().unwrap_or(Value::Null));
                }
            }
            for h in hooks {
                h.post_apply(&c.address, c.action, None);
            }
        }
        (Some(next), Diagnostics::new())
    }

    fn stop(&self) {}
}

/// Write a state with `null_resource.a` to `dir/terraform.tfstate`.
pub fn seed_state(dir: &Path) -> State {
    let mut st = State::new();
    st.serial = 3;
    st.resources.insert("null_resource.a".into(), json!({"id": "a"}));
    std::fs::write(dir.join("terraform.tfstate"), st.to_vec().unwrap()).unwrap();
    st
}

pub fn read_state(path: &Path) -> State {
    State::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// An `OpCore` with the scripted engine, a recording view and redacted facts.
pub fn opcore_for(
    view: Arc<RecordingView>,
    settings: opcore::config::Settings,
) -> (opcore::OpCore<TestEmitter, TestAudit>, TestEmitter) {
    let facts = TestEmitter::default();
    let api = opcore::OpCoreBuilder::new(facts.clone(), TestAudit, settings, Arc::new(ScriptedEngine))
        .view(view)
        .redact(true)
        .build();
    (api, facts)
}
