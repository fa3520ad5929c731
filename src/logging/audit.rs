// Structured facts for each stage of an operation.
//
// Every fact carries the envelope `schema_version`, `ts`, `operation_id`,
// `stage` and `decision`. Redaction, when enabled, is applied here so call
// sites never emit unredacted timing fields by accident.
use serde_json::{json, Value};

use crate::api::errors::{exit_code_for, id_str, ErrorId};
use crate::logging::{redact_event, FactsEmitter};

pub(crate) const SCHEMA_VERSION: i64 = 1;
const SUBSYSTEM: &str = "opcore";

pub(crate) struct AuditCtx<'a> {
    pub facts: &'a dyn FactsEmitter,
    pub operation_id: String,
    pub ts: String,
    pub redact: bool,
}

impl<'a> AuditCtx<'a> {
    pub(crate) fn new(facts: &'a dyn FactsEmitter, operation_id: String, ts: String, redact: bool) -> Self {
        Self {
            facts,
            operation_id,
            ts,
            redact,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    PlanFileLoad,
    BackendResolve,
    DepsfileLoad,
    LockAcquire,
    LockRelease,
    OperationStart,
    OperationResult,
}

impl Stage {
    #[must_use]
    pub fn as_event(self) -> &'static str {
        match self {
            Stage::PlanFileLoad => "plan_file.load",
            Stage::BackendResolve => "backend.resolve",
            Stage::DepsfileLoad => "depsfile.load",
            Stage::LockAcquire => "lock.acquire",
            Stage::LockRelease => "lock.release",
            Stage::OperationStart => "operation.start",
            Stage::OperationResult => "operation.result",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Success,
    Failure,
    Warn,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Decision::Success => "success",
            Decision::Failure => "failure",
            Decision::Warn => "warn",
        }
    }
}

pub struct StageLogger<'a> {
    ctx: &'a AuditCtx<'a>,
}

impl<'a> StageLogger<'a> {
    pub(crate) fn new(ctx: &'a AuditCtx<'a>) -> Self {
        Self { ctx }
    }

    pub fn stage(&self, stage: Stage) -> EventBuilder<'a> {
        EventBuilder::new(self.ctx, stage)
    }

    pub fn plan_file_load(&self) -> EventBuilder<'a> {
        self.stage(Stage::PlanFileLoad)
    }

    pub fn backend_resolve(&self) -> EventBuilder<'a> {
        self.stage(Stage::BackendResolve)
    }

    pub fn depsfile_load(&self) -> EventBuilder<'a> {
        self.stage(Stage::DepsfileLoad)
    }

    pub fn lock_acquire(&self) -> EventBuilder<'a> {
        self.stage(Stage::LockAcquire)
    }

    pub fn lock_release(&self) -> EventBuilder<'a> {
        self.stage(Stage::LockRelease)
    }

    pub fn operation_start(&self) -> EventBuilder<'a> {
        self.stage(Stage::OperationStart)
    }

    pub fn operation_result(&self) -> EventBuilder<'a> {
        self.stage(Stage::OperationResult)
    }
}

pub struct EventBuilder<'a> {
    ctx: &'a AuditCtx<'a>,
    stage: Stage,
    fields: serde_json::Map<String, Value>,
}

impl<'a> EventBuilder<'a> {
    fn new(ctx: &'a AuditCtx<'a>, stage: Stage) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("stage".to_string(), json!(stage.as_event()));
        Self { ctx, stage, fields }
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.fields.insert("path".into(), json!(path.into()));
        self
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn merge(mut self, extra: &Value) -> Self {
        if let Some(obj) = extra.as_object() {
            for (k, v) in obj {
                self.fields.insert(k.clone(), v.clone());
            }
        }
        self
    }

    /// Attach `error_id` and the matching `exit_code`.
    #[must_use]
    pub fn error_id(mut self, id: ErrorId) -> Self {
        self.fields.insert("error_id".into(), json!(id_str(id)));
        self.fields.insert("exit_code".into(), json!(exit_code_for(id)));
        self
    }

    pub fn emit(self, decision: Decision) {
        let mut fields = Value::Object(self.fields);
        if let Some(obj) = fields.as_object_mut() {
            obj.insert("decision".into(), json!(decision.as_str()));
            obj.entry("schema_version").or_insert(json!(SCHEMA_VERSION));
            obj.entry("ts").or_insert(json!(self.ctx.ts));
            obj.entry("operation_id").or_insert(json!(self.ctx.operation_id));
        }
        let out = if self.ctx.redact { redact_event(fields) } else { fields };
        self.ctx
            .facts
            .emit(SUBSYSTEM, self.stage.as_event(), decision.as_str(), out);
    }

    pub fn emit_success(self) {
        self.emit(Decision::Success);
    }

    pub fn emit_failure(self) {
        self.emit(Decision::Failure);
    }

    pub fn emit_warn(self) {
        self.emit(Decision::Warn);
    }
}
