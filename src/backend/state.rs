//! The backend-state record: which backend type and configuration the
//! working directory was initialized with.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::{BACKEND_STATE_FILE, BACKEND_STATE_VERSION};
use crate::fs::atomic::write_atomic;
use crate::types::errors::{Error, ErrorKind, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "empty_config")]
    pub config: Value,
}

fn empty_config() -> Value {
    json!({})
}

impl BackendRecord {
    #[must_use]
    pub fn new(type_name: impl Into<String>, config: Value) -> Self {
        Self {
            type_name: type_name.into(),
            config,
        }
    }

    /// Stand-in used when nothing is configured: `local` with an empty body.
    #[must_use]
    pub fn local() -> Self {
        Self::new("local", empty_config())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    version: u32,
    #[serde(default)]
    backend: Option<BackendRecord>,
}

#[must_use]
pub fn record_path(data_dir: &Path) -> PathBuf {
    data_dir.join(BACKEND_STATE_FILE)
}

/// Read the record under `data_dir`; `Ok(None)` if the directory was never
/// initialized with a backend.
///
/// # Errors
/// Returns an error if the record exists but cannot be read or decoded.
pub fn load_record(data_dir: &Path) -> Result<Option<BackendRecord>> {
    let path = record_path(data_dir);
    let data = match std::fs::read(&path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::new(ErrorKind::Io, format!("{}: {e}", path.display()))),
    };
    let file: RecordFile = serde_json::from_slice(&data)
        .map_err(|e| Error::new(ErrorKind::Parse, format!("{}: {e}", path.display())))?;
    if file.version > BACKEND_STATE_VERSION {
        return Err(Error::new(
            ErrorKind::Parse,
            format!(
                "{}: backend state format version {} is not supported",
                path.display(),
                file.version
            ),
        ));
    }
    Ok(file.backend)
}

/// Persist `record`, creating `data_dir` if needed.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_record(data_dir: &Path, record: &BackendRecord) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let file = RecordFile {
        version: BACKEND_STATE_VERSION,
        backend: Some(record.clone()),
    };
    let mut data = serde_json::to_vec_pretty(&file)
        .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode backend state: {e}")))?;
    data.push(b'\n');
    write_atomic(&record_path(data_dir), &data, 0o644)?;
    Ok(())
}

/// Forget the record, e.g. after the backend block was removed.
///
/// # Errors
/// Returns an error if an existing record cannot be removed.
pub fn clear_record(data_dir: &Path) -> Result<()> {
    match std::fs::remove_file(record_path(data_dir)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_is_none_and_save_round_trips() {
        let td = tempfile::tempdir().unwrap();
        let data_dir = td.path().join(".terraform");
        assert!(load_record(&data_dir).unwrap().is_none());
        let rec = BackendRecord::new("local", json!({"path": "other.tfstate"}));
        save_record(&data_dir, &rec).unwrap();
        assert_eq!(load_record(&data_dir).unwrap(), Some(rec));
        clear_record(&data_dir).unwrap();
        assert!(load_record(&data_dir).unwrap().is_none());
    }

    #[test]
    fn future_version_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        std::fs::write(record_path(td.path()), br#"{"version": 99}"#).unwrap();
        assert_eq!(load_record(td.path()).unwrap_err().kind, ErrorKind::Parse);
    }
}
