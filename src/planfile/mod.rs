//! Saved plan artifacts.
//!
//! A plan file is either *local* (an execution plan together with the
//! backend configuration that produced it) or *cloud* (a reference to a run
//! held by a remote service). The variant is recorded inside the container,
//! not in the file name.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encryption::Encryption;
use crate::types::errors::{Error, ErrorKind, Result};
use crate::types::plan::Plan;

pub mod container;

use container::PlanKind;

/// Reference to a plan stored by a remote service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudPlan {
    pub hostname: String,
    pub run_id: String,
}

#[derive(Clone, Debug)]
pub struct LocalPlanFile {
    path: PathBuf,
    payload: Value,
}

impl LocalPlanFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the embedded execution plan.
    ///
    /// # Errors
    /// Returns `ErrorKind::Parse` if the payload is not a plan record.
    pub fn read_plan(&self) -> Result<Plan> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            Error::new(
                ErrorKind::Parse,
                format!("failed to read plan from {}: {e}", self.path.display()),
            )
        })
    }
}

#[derive(Clone, Debug)]
pub enum WrappedPlanFile {
    Local(LocalPlanFile),
    Cloud { path: PathBuf, plan: CloudPlan },
}

impl WrappedPlanFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            WrappedPlanFile::Local(l) => l.path(),
            WrappedPlanFile::Cloud { path, .. } => path,
        }
    }

    #[must_use]
    pub fn local(&self) -> Option<&LocalPlanFile> {
        match self {
            WrappedPlanFile::Local(l) => Some(l),
            WrappedPlanFile::Cloud { .. } => None,
        }
    }

    #[must_use]
    pub fn cloud(&self) -> Option<&CloudPlan> {
        match self {
            WrappedPlanFile::Local(_) => None,
            WrappedPlanFile::Cloud { plan, .. } => Some(plan),
        }
    }
}

/// Open `path` as a plan file.
///
/// # Errors
/// Returns `ErrorKind::Io` if the file cannot be read, `ErrorKind::Parse` if
/// it is not a plan file, `ErrorKind::Encryption` if it cannot be decrypted.
pub fn open_wrapped(path: &Path, enc: &dyn Encryption) -> Result<WrappedPlanFile> {
    let data = std::fs::read(path)
        .map_err(|e| Error::new(ErrorKind::Io, format!("failed to read {}: {e}", path.display())))?;
    let (kind, payload) = container::decode(&data, enc)?;
    Ok(match kind {
        PlanKind::Local => WrappedPlanFile::Local(LocalPlanFile {
            path: path.to_path_buf(),
            payload,
        }),
        PlanKind::Cloud => {
            let plan: CloudPlan = serde_json::from_value(payload).map_err(|e| {
                Error::new(ErrorKind::Parse, format!("invalid cloud plan reference: {e}"))
            })?;
            WrappedPlanFile::Cloud {
                path: path.to_path_buf(),
                plan,
            }
        }
    })
}

/// Stat `path` and open it as a plan. A directory yields `Ok(None)`: the
/// caller was given a configuration root, not a plan.
///
/// # Errors
/// As [`open_wrapped`], plus `ErrorKind::InvalidPath` if the path does not exist.
pub fn open_path(path: &Path, enc: &dyn Encryption) -> Result<Option<WrappedPlanFile>> {
    let md = std::fs::metadata(path).map_err(|e| {
        let kind = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::InvalidPath
        } else {
            ErrorKind::Io
        };
        Error::new(kind, format!("{}: {e}", path.display()))
    })?;
    if md.is_dir() {
        return Ok(None);
    }
    open_wrapped(path, enc).map(Some)
}

/// Write a local plan artifact.
///
/// # Errors
/// Returns an error if encoding, encryption or the atomic write fails.
pub fn create_local(path: &Path, plan: &Plan, enc: &dyn Encryption) -> Result<()> {
    let payload = serde_json::to_value(plan)
        .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode plan: {e}")))?;
    container::write(path, PlanKind::Local, payload, enc)
}

/// Write a cloud plan reference.
///
/// # Errors
/// Returns an error if encoding, encryption or the atomic write fails.
pub fn create_cloud(path: &Path, plan: &CloudPlan, enc: &dyn Encryption) -> Result<()> {
    let payload = serde_json::to_value(plan)
        .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to encode plan: {e}")))?;
    container::write(path, PlanKind::Cloud, payload, enc)
}
