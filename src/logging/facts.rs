use std::io::Write;
use std::sync::Mutex;

use log::Level;
use serde_json::{json, Value};

pub trait FactsEmitter {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value);
}

pub trait AuditSink {
    fn log(&self, level: Level, msg: &str);
}

/// Writes one JSON object per fact and one `[LEVEL] msg` line per audit
/// message. `JsonlSink::default()` discards everything.
#[derive(Default)]
pub struct JsonlSink {
    out: Option<Mutex<Box<dyn Write + Send>>>,
}

impl JsonlSink {
    #[must_use]
    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Some(Mutex::new(out)),
        }
    }

    fn write_line(&self, line: &str) {
        if let Some(m) = &self.out {
            if let Ok(mut w) = m.lock() {
                let _ = writeln!(w, "{line}");
            }
        }
    }
}

impl FactsEmitter for JsonlSink {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value) {
        if self.out.is_none() {
            return;
        }
        let mut obj = json!({
            "subsystem": subsystem,
            "event": event,
            "decision": decision,
        });
        if let (Some(o), Some(f)) = (obj.as_object_mut(), fields.as_object()) {
            for (k, v) in f {
                o.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        self.write_line(&obj.to_string());
    }
}

impl AuditSink for JsonlSink {
    fn log(&self, level: Level, msg: &str) {
        self.write_line(&format!("[{level}] {msg}"));
    }
}
