//! State storage and the low-level locking primitive.
//!
//! A [`StateMgr`] reads and persists one state resource and exposes a
//! non-blocking lock over it. Waiting, backoff and release bookkeeping live
//! one layer up in [`crate::statelock`].
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ERRORED_STATE_FILE, TOOL_VERSION};
use crate::encryption::{self, Encryption, Payload};
use crate::fs::atomic::write_atomic;
use crate::logging::redact::now_iso;
use crate::types::errors::Result;
use crate::types::state::State;

pub mod filesystem;

pub use filesystem::Filesystem;

/// Metadata recorded by a lock holder so contenders can tell who holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LockInfo {
    #[serde(rename = "ID")]
    pub id: String,
    pub operation: String,
    #[serde(default)]
    pub info: String,
    pub who: String,
    pub version: String,
    pub created: String,
    #[serde(default)]
    pub path: String,
}

fn who() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = gethostname::gethostname().to_string_lossy().trim().to_string();
    let host = if host.is_empty() { "localhost".to_string() } else { host };
    format!("{user}@{host}")
}

impl LockInfo {
    /// Fresh holder info with a random ID for `operation`.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            info: String::new(),
            who: who(),
            version: TOOL_VERSION.to_string(),
            created: now_iso(),
            path: String::new(),
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lock Info:")?;
        writeln!(f, "  ID:        {}", self.id)?;
        writeln!(f, "  Path:      {}", self.path)?;
        writeln!(f, "  Operation: {}", self.operation)?;
        writeln!(f, "  Who:       {}", self.who)?;
        writeln!(f, "  Version:   {}", self.version)?;
        writeln!(f, "  Created:   {}", self.created)?;
        write!(f, "  Info:      {}", self.info)
    }
}

/// Lock failure. `info` describes the current holder when known.
#[derive(Debug)]
pub struct LockError {
    pub info: Option<LockInfo>,
    pub err: String,
    /// True when the lock is held by someone else and a retry may succeed.
    pub contended: bool,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.err)?;
        if let Some(info) = &self.info {
            write!(f, "\n{info}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LockError {}

impl LockError {
    pub fn failed(err: impl Into<String>) -> Self {
        Self {
            info: None,
            err: err.into(),
            contended: false,
        }
    }
}

pub trait StateMgr: Send + Sync {
    /// Human-readable name of the state resource, e.g. its path.
    fn name(&self) -> String;

    /// Lock the resource without waiting. Returns the lock ID on success.
    ///
    /// # Errors
    /// Returns a [`LockError`] with `contended = true` if another holder has it.
    fn lock(&self, info: &LockInfo) -> std::result::Result<String, LockError>;

    /// Release a lock previously returned by [`lock`](Self::lock).
    ///
    /// # Errors
    /// Returns a [`LockError`] if `id` does not match or the release fails.
    fn unlock(&self, id: &str) -> std::result::Result<(), LockError>;

    /// Read the persisted snapshot; `None` if nothing has been persisted yet.
    ///
    /// # Errors
    /// Returns an error if the snapshot exists but cannot be read or decoded.
    fn read(&self) -> Result<Option<State>>;

    /// Persist `state`, assigning serial and lineage, and return what was written.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be encoded or written.
    fn write(&self, state: &State) -> Result<State>;
}

/// Write `state` to `errored.tfstate` under `dir` so it can be recovered
/// after the real destination refused it.
///
/// # Errors
/// Returns an error if the recovery file cannot be written either.
pub fn write_errored_state(dir: &Path, state: &State, enc: &dyn Encryption) -> Result<PathBuf> {
    let path = dir.join(ERRORED_STATE_FILE);
    let bytes = encryption::seal(enc, Payload::State, &state.to_vec()?)?;
    write_atomic(&path, &bytes, 0o600)?;
    Ok(path)
}
