//! State kept in a local file.
//!
//! Locking takes an exclusive advisory lock (fs2) on the output file, opened
//! without truncation so a failed attempt never alters it, and records the
//! holder in `.<name>.lock.info` next to it. While locked, writes go through
//! the locked handle; replacing the file by rename would orphan the lock.
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs2::FileExt;
use uuid::Uuid;

use crate::constants::{STATE_FORMAT_VERSION, TOOL_VERSION};
use crate::encryption::{self, Encryption, Payload};
use crate::fs::atomic::write_atomic;
use crate::types::errors::{Error, ErrorKind, Result};
use crate::types::state::State;

use super::{LockError, LockInfo, StateMgr};

struct HeldLock {
    file: File,
    id: String,
    /// The output file did not exist before locking.
    created: bool,
}

#[derive(Default)]
struct Inner {
    lock: Option<HeldLock>,
    read_done: bool,
    /// Raw bytes of the input file at first read; the backup is exactly these.
    prior_bytes: Option<Vec<u8>>,
    current: Option<State>,
    backup_done: bool,
}

pub struct Filesystem {
    path: PathBuf,
    path_out: PathBuf,
    backup_path: Option<PathBuf>,
    encryption: Arc<dyn Encryption>,
    inner: Mutex<Inner>,
}

impl Filesystem {
    /// `path_out` defaults to `path`. `backup_path = None` disables backups.
    #[must_use]
    pub fn new(
        path: PathBuf,
        path_out: Option<PathBuf>,
        backup_path: Option<PathBuf>,
        encryption: Arc<dyn Encryption>,
    ) -> Self {
        Self {
            path_out: path_out.unwrap_or_else(|| path.clone()),
            path,
            backup_path,
            encryption,
            inner: Mutex::new(Inner::default()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn path_out(&self) -> &Path {
        &self.path_out
    }

    #[must_use]
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    /// `.<name>.lock.info` beside the output file.
    #[must_use]
    pub fn lock_info_path(&self) -> PathBuf {
        let name = self
            .path_out
            .file_name()
            .map_or_else(|| "terraform.tfstate".to_string(), |n| n.to_string_lossy().to_string());
        self.path_out.with_file_name(format!(".{name}.lock.info"))
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A poisoned guard only means another thread panicked mid-call; the
        // data is still a consistent snapshot.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read_lock_info(&self) -> Option<LockInfo> {
        let data = std::fs::read(self.lock_info_path()).ok()?;
        serde_json::from_slice(&data).ok()
    }

    fn read_locked(&self, inner: &mut Inner) -> Result<Option<State>> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Error::new(
                    ErrorKind::Io,
                    format!("failed to read state from {}: {e}", self.path.display()),
                ))
            }
        };
        if !inner.read_done {
            inner.read_done = true;
            inner.prior_bytes = (!data.is_empty()).then(|| data.clone());
        }
        if data.is_empty() {
            inner.current = None;
            return Ok(None);
        }
        let plain = encryption::open(self.encryption.as_ref(), Payload::State, &data)?;
        let st = State::from_slice(&plain).map_err(|e| {
            Error::new(e.kind, format!("{}: {}", self.path.display(), e.msg))
        })?;
        inner.current = Some(st.clone());
        Ok(Some(st))
    }
}

impl StateMgr for Filesystem {
    fn name(&self) -> String {
        self.path_out.display().to_string()
    }

    fn lock(&self, info: &LockInfo) -> std::result::Result<String, LockError> {
        let mut inner = self.inner();
        if inner.lock.is_some() {
            return Err(LockError {
                info: self.read_lock_info(),
                err: format!("state {} is already locked by this process", self.path_out.display()),
                contended: false,
            });
        }
        let existed = self.path_out.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path_out)
            .map_err(|e| LockError::failed(format!("failed to open state file {}: {e}", self.path_out.display())))?;
        if let Err(e) = file.try_lock_exclusive() {
            return Err(LockError {
                info: self.read_lock_info(),
                err: format!("state file {} is locked: {e}", self.path_out.display()),
                contended: true,
            });
        }
        let mut held = info.clone();
        held.path = self.path_out.display().to_string();
        let written = serde_json::to_vec(&held)
            .map_err(|e| e.to_string())
            .and_then(|b| write_atomic(&self.lock_info_path(), &b, 0o600).map_err(|e| e.to_string()));
        if let Err(e) = written {
            let _ = file.unlock();
            return Err(LockError::failed(format!("failed to write lock info: {e}")));
        }
        inner.lock = Some(HeldLock {
            file,
            id: held.id.clone(),
            created: !existed,
        });
        Ok(held.id)
    }

    fn unlock(&self, id: &str) -> std::result::Result<(), LockError> {
        let mut inner = self.inner();
        let Some(held) = inner.lock.take() else {
            return Err(LockError::failed(format!("state {} is not locked", self.path_out.display())));
        };
        if held.id != id {
            let info = self.read_lock_info();
            inner.lock = Some(held);
            return Err(LockError {
                info,
                err: format!("lock ID {id:?} does not match the existing lock"),
                contended: false,
            });
        }
        let mut problems = Vec::new();
        match std::fs::remove_file(self.lock_info_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => problems.push(format!("failed to remove lock info: {e}")),
        }
        if held.created && held.file.metadata().map(|m| m.len() == 0).unwrap_or(false) {
            let _ = std::fs::remove_file(&self.path_out);
        }
        if let Err(e) = held.file.unlock() {
            problems.push(format!("failed to release file lock: {e}"));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(LockError::failed(problems.join("; ")))
        }
    }

    fn read(&self) -> Result<Option<State>> {
        let mut inner = self.inner();
        self.read_locked(&mut inner)
    }

    fn write(&self, state: &State) -> Result<State> {
        let mut inner = self.inner();
        if !inner.read_done {
            self.read_locked(&mut inner)?;
        }
        // Prior bytes that never decoded: keep them rather than overwrite.
        if inner.current.is_none() && inner.prior_bytes.is_some() {
            return Err(Error::new(
                ErrorKind::Parse,
                format!(
                    "refusing to overwrite {}: the existing state could not be read",
                    self.path.display()
                ),
            ));
        }
        if let (Some(bp), false) = (&self.backup_path, inner.backup_done) {
            if let Some(bytes) = &inner.prior_bytes {
                write_atomic(bp, bytes, 0o600).map_err(|e| {
                    Error::new(ErrorKind::Io, format!("failed to write state backup {}: {e}", bp.display()))
                })?;
            }
            inner.backup_done = true;
        }

        let mut next = state.clone();
        next.version = STATE_FORMAT_VERSION;
        next.tool_version = TOOL_VERSION.to_string();
        match &inner.current {
            Some(cur) => {
                next.lineage = cur.lineage.clone();
                next.serial = if cur.same_content(&next) { cur.serial } else { cur.serial + 1 };
            }
            None => {
                if next.lineage.is_empty() {
                    next.lineage = Uuid::new_v4().to_string();
                }
                next.serial = next.serial.max(1);
            }
        }
        let bytes = encryption::seal(self.encryption.as_ref(), Payload::State, &next.to_vec()?)?;
        let io_err = |e: std::io::Error| {
            Error::new(ErrorKind::Io, format!("failed to write state to {}: {e}", self.path_out.display()))
        };
        match inner.lock.as_mut() {
            Some(held) => {
                let f = &mut held.file;
                f.set_len(0).map_err(io_err)?;
                f.seek(SeekFrom::Start(0)).map_err(io_err)?;
                f.write_all(&bytes).map_err(io_err)?;
                f.sync_all().map_err(io_err)?;
            }
            None => write_atomic(&self.path_out, &bytes, 0o644).map_err(io_err)?,
        }
        inner.current = Some(next.clone());
        Ok(next)
    }
}
