//! Persisted infrastructure state document.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{STATE_FORMAT_VERSION, TOOL_VERSION};

use super::errors::{Error, ErrorKind, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: Value,
    #[serde(default)]
    pub sensitive: bool,
}

/// State snapshot. `serial` increases on every persisted content change;
/// `lineage` identifies the chain of snapshots and never changes once set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    #[serde(default)]
    pub tool_version: String,
    pub serial: u64,
    pub lineage: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputValue>,
    /// Resource instance objects keyed by absolute address.
    #[serde(default)]
    pub resources: BTreeMap<String, Value>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Empty state with a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            tool_version: TOOL_VERSION.to_string(),
            serial: 0,
            lineage: Uuid::new_v4().to_string(),
            outputs: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.outputs.is_empty()
    }

    /// Compare content only, ignoring serial, lineage and writer version.
    #[must_use]
    pub fn same_content(&self, other: &State) -> bool {
        self.resources == other.resources && self.outputs == other.outputs
    }

    /// # Errors
    /// Returns `ErrorKind::Parse` if the bytes are not a state document.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let st: State = serde_json::from_slice(data)
            .map_err(|e| Error::new(ErrorKind::Parse, format!("failed to decode state: {e}")))?;
        if st.version > STATE_FORMAT_VERSION {
            return Err(Error::new(
                ErrorKind::Parse,
                format!(
                    "state format version {} is newer than the supported version {STATE_FORMAT_VERSION}",
                    st.version
                ),
            ));
        }
        Ok(st)
    }

    /// # Errors
    /// Returns `ErrorKind::Internal` if serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode state: {e}")))?;
        out.push(b'\n');
        Ok(out)
    }
}
