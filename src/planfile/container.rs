//! On-disk plan artifact container.
//!
//! ```json
//! {"format": "opcore-plan", "format_version": 1, "kind": "local",
//!  "tool_version": "0.1.0", "payload": {...}, "payload_sha256": "..."}
//! ```
//!
//! The whole document may additionally be sealed by an encryption provider.
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{PLAN_FORMAT, PLAN_FORMAT_VERSION, TOOL_VERSION};
use crate::encryption::{self, Encryption, Payload};
use crate::fs::atomic::write_atomic;
use crate::fs::meta::sha256_hex;
use crate::types::errors::{Error, ErrorKind, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Local,
    Cloud,
}

#[derive(Serialize, Deserialize)]
struct Container {
    format: String,
    format_version: u32,
    kind: PlanKind,
    #[serde(default)]
    tool_version: String,
    payload: Value,
    payload_sha256: String,
}

fn digest(payload: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode plan payload: {e}")))?;
    Ok(sha256_hex(&bytes))
}

/// Decode and verify a container, returning its kind and payload.
pub(crate) fn decode(data: &[u8], enc: &dyn Encryption) -> Result<(PlanKind, Value)> {
    let plain = encryption::open(enc, Payload::Plan, data)?;
    let c: Container = serde_json::from_slice(&plain)
        .map_err(|e| Error::new(ErrorKind::Parse, format!("not a valid plan file: {e}")))?;
    if c.format != PLAN_FORMAT {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("not a valid plan file: unexpected format {:?}", c.format),
        ));
    }
    if c.format_version != PLAN_FORMAT_VERSION {
        return Err(Error::new(
            ErrorKind::Parse,
            format!(
                "plan file format version {} is not supported by this version ({TOOL_VERSION}); create a new plan",
                c.format_version
            ),
        ));
    }
    if digest(&c.payload)? != c.payload_sha256 {
        return Err(Error::new(
            ErrorKind::Parse,
            "plan file is corrupt: payload checksum does not match",
        ));
    }
    Ok((c.kind, c.payload))
}

/// Encode a payload into a (possibly sealed) container.
pub(crate) fn encode(kind: PlanKind, payload: Value, enc: &dyn Encryption) -> Result<Vec<u8>> {
    let c = Container {
        format: PLAN_FORMAT.to_string(),
        format_version: PLAN_FORMAT_VERSION,
        kind,
        tool_version: TOOL_VERSION.to_string(),
        payload_sha256: digest(&payload)?,
        payload,
    };
    let plain = serde_json::to_vec_pretty(&c)
        .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode plan file: {e}")))?;
    encryption::seal(enc, Payload::Plan, &plain)
}

pub(crate) fn write(path: &Path, kind: PlanKind, payload: Value, enc: &dyn Encryption) -> Result<()> {
    let bytes = encode(kind, payload, enc)?;
    write_atomic(path, &bytes, 0o600)
        .map_err(|e| Error::new(ErrorKind::Io, format!("failed to write plan file {}: {e}", path.display())))
}
