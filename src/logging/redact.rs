use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const TS_ZERO: &str = "1970-01-01T00:00:00Z";

pub fn now_iso() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| TS_ZERO.to_string())
}

/// Normalize a fact for comparison: zero the timestamp and drop timing
/// fields that differ between runs.
pub fn redact_event(mut v: Value) -> Value {
    if let Some(obj) = v.as_object_mut() {
        obj.insert("ts".into(), Value::String(TS_ZERO.to_string()));
        obj.remove("duration_ms");
        obj.remove("lock_wait_ms");
        // Holder info embeds the lock ID and creation time.
        if let Some(holder) = obj.get_mut("lock_holder").and_then(Value::as_object_mut) {
            holder.remove("ID");
            holder.remove("Created");
        }
    }
    v
}
