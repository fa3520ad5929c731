//! The `local` backend: state in a file next to the configuration and
//! operations executed in this process.
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::config::StatePaths;
use crate::constants::{
    BACKUP_DISABLED, DEFAULT_BACKUP_EXTENSION, DEFAULT_STATE_FILE, DEFAULT_WORKSPACE, OPERATION_POLL_MS,
};
use crate::encryption::Encryption;
use crate::engine::CoreEngine;
use crate::operation::{Operation, OperationOutcome, OperationResult, OperationType, RunningOperation, StopSignal};
use crate::statemgr::{write_errored_state, Filesystem, StateMgr};
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::types::plan::{PlanBackend, PlanMode};
use crate::types::state::State;

use super::init::BackendInit;
use super::Backend;

mod apply;
mod plan;
mod refresh;

const WORKSPACE_DIR: &str = "terraform.tfstate.d";

pub struct LocalBackend {
    config_dir: PathBuf,
    config: Value,
    /// State path of the default workspace.
    path: PathBuf,
    workspace_dir: PathBuf,
    overrides: StatePaths,
    encryption: Arc<dyn Encryption>,
}

fn config_error(summary: &str, detail: String) -> Diagnostics {
    Diagnostics::new().with(Diagnostic::error(DiagClass::Configuration, summary, detail))
}

impl LocalBackend {
    /// Configure from a `backend "local"` body: optional `path` and `workspace_dir`.
    ///
    /// # Errors
    /// Returns configuration diagnostics for unknown or mistyped arguments.
    pub fn from_init(init: &BackendInit<'_>) -> Result<Self, Diagnostics> {
        let config_dir = init.settings.config_dir.clone();
        let resolve = |p: &str| -> PathBuf {
            let p = Path::new(p);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                config_dir.join(p)
            }
        };
        let Some(body) = init.config.as_object() else {
            return Err(config_error(
                "Invalid backend configuration",
                "The \"local\" backend configuration must be an object.".to_string(),
            ));
        };
        let mut path = config_dir.join(DEFAULT_STATE_FILE);
        let mut workspace_dir = config_dir.join(WORKSPACE_DIR);
        for (k, v) in body {
            let Some(s) = v.as_str() else {
                return Err(config_error(
                    "Invalid backend configuration",
                    format!("The \"{k}\" argument of the \"local\" backend must be a string."),
                ));
            };
            match k.as_str() {
                "path" => path = resolve(s),
                "workspace_dir" => workspace_dir = resolve(s),
                other => {
                    return Err(config_error(
                        "Unsupported argument",
                        format!("An argument named \"{other}\" is not expected in the \"local\" backend."),
                    ))
                }
            }
        }
        Ok(Self {
            overrides: init.settings.paths.clone(),
            config: init.config.clone(),
            config_dir,
            path,
            workspace_dir,
            encryption: init.encryption.clone(),
        })
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// `(state, state_out, backup)` for `workspace` after `-state`,
    /// `-state-out` and `-backup` are applied.
    #[must_use]
    pub fn state_paths(&self, workspace: &str) -> (PathBuf, PathBuf, Option<PathBuf>) {
        let state = match (&self.overrides.state, workspace) {
            (Some(p), _) => self.resolve(p),
            (None, DEFAULT_WORKSPACE) => self.path.clone(),
            (None, ws) => self.workspace_dir.join(ws).join(DEFAULT_STATE_FILE),
        };
        let out = self.overrides.state_out.as_deref().map_or_else(|| state.clone(), |p| self.resolve(p));
        let backup = match &self.overrides.backup {
            Some(p) if p.as_os_str() == BACKUP_DISABLED => None,
            Some(p) => Some(self.resolve(p)),
            None => {
                let mut s = out.clone().into_os_string();
                s.push(DEFAULT_BACKUP_EXTENSION);
                Some(PathBuf::from(s))
            }
        };
        (state, out, backup)
    }
}

impl Backend for LocalBackend {
    fn type_name(&self) -> &str {
        "local"
    }

    fn state_mgr(&self, workspace: &str) -> Result<Arc<dyn StateMgr>, Diagnostics> {
        if workspace.is_empty() || workspace.contains(['/', '\\']) || workspace == "." || workspace == ".." {
            return Err(config_error(
                "Invalid workspace name",
                format!("The workspace name {workspace:?} is not allowed."),
            ));
        }
        let (state, out, backup) = self.state_paths(workspace);
        if workspace != DEFAULT_WORKSPACE {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    config_error(
                        "Failed to prepare workspace",
                        format!("Could not create {}: {e}", parent.display()),
                    )
                })?;
            }
        }
        let out = (out != state).then_some(out);
        Ok(Arc::new(Filesystem::new(state, out, backup, self.encryption.clone())))
    }

    fn operation(&self, op: Arc<Operation>) -> Result<RunningOperation, Diagnostics> {
        let mgr = self.state_mgr(op.workspace())?;
        let run = LocalRun {
            backend: PlanBackend {
                type_name: self.type_name().to_string(),
                config: Some(self.config.clone()),
                workspace: op.workspace().to_string(),
            },
            errored_dir: self.config_dir.clone(),
            op,
            mgr,
        };
        Ok(RunningOperation::spawn(move |sig| match run.op.op_type() {
            OperationType::Apply => apply::run(&run, &sig),
            OperationType::Plan => plan::run(&run, &sig),
            OperationType::Refresh => refresh::run(&run, &sig),
        }))
    }
}

/// Engine call that ran to completion, or why it did not.
pub(crate) enum Waited<T> {
    Done(T),
    Cancelled,
    Crashed,
}

/// State shared by the local operation bodies.
pub(crate) struct LocalRun {
    pub op: Arc<Operation>,
    pub mgr: Arc<dyn StateMgr>,
    /// Recorded into plans this backend produces.
    pub backend: PlanBackend,
    pub errored_dir: PathBuf,
}

impl LocalRun {
    /// Run `body` while holding the state lock. The lock is released on
    /// every path and release errors are merged into the outcome.
    pub fn locked<F>(&self, body: F) -> OperationOutcome
    where
        F: FnOnce() -> OperationOutcome,
    {
        let lock = match self.op.state_locker().lock(self.mgr.clone(), self.op.op_type().lock_name()) {
            Ok(l) => l,
            Err(failed) => {
                let mut out = OperationOutcome::failure(failed.diags);
                out.lock = Some(failed.report);
                return out;
            }
        };
        let report = lock.report().clone();
        let mut out = body();
        let released = lock.release();
        if released.has_errors() && out.result == OperationResult::Success {
            out.result = OperationResult::Failure;
        }
        out.diags.extend(released);
        out.lock = Some(report);
        out
    }

    /// Prior state; `Ok(None)` when nothing has been persisted yet.
    pub fn read_state(&self) -> Result<Option<State>, Diagnostics> {
        self.mgr.read().map_err(|e| {
            Diagnostics::new().with(Diagnostic::error(
                DiagClass::Backend,
                "Failed to load state",
                format!("Error loading state from {}: {}", self.mgr.name(), e.msg),
            ))
        })
    }

    /// Persist `state`, falling back to `errored.tfstate` so nothing is lost.
    pub fn persist(&self, state: &State, diags: &mut Diagnostics) -> Option<State> {
        match self.mgr.write(state) {
            Ok(written) => Some(written),
            Err(e) => {
                let detail = match write_errored_state(&self.errored_dir, state, self.op.encryption().as_ref()) {
                    Ok(p) => format!(
                        "Error saving state: {}\n\nOpenTofu could not persist the state to the backend. The state has been written to {} instead; it can be pushed back once the problem is resolved.",
                        e.msg,
                        p.display()
                    ),
                    Err(e2) => format!(
                        "Error saving state: {}\n\nWriting the recovery copy also failed: {}. The state from this run may be lost.",
                        e.msg, e2.msg
                    ),
                };
                diags.push(Diagnostic::error(DiagClass::Backend, "Failed to save state", detail));
                None
            }
        }
    }

    /// Run `work` against the engine on a helper thread, forwarding stop
    /// requests. A cancel abandons the call without waiting for it.
    pub fn wait_engine<T, F>(&self, sig: &StopSignal, work: F) -> Waited<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CoreEngine) -> T + Send + 'static,
    {
        let engine = self.op.engine().clone();
        let (tx, rx) = mpsc::channel();
        let worker_engine = engine.clone();
        thread::spawn(move || {
            let _ = tx.send(work(worker_engine.as_ref()));
        });
        let mut stop_sent = false;
        loop {
            match rx.recv_timeout(Duration::from_millis(OPERATION_POLL_MS)) {
                Ok(v) => return Waited::Done(v),
                Err(RecvTimeoutError::Disconnected) => return Waited::Crashed,
                Err(RecvTimeoutError::Timeout) => {
                    if sig.is_cancelled() {
                        return Waited::Cancelled;
                    }
                    if sig.is_stopped() && !stop_sent {
                        stop_sent = true;
                        engine.stop();
                    }
                }
            }
        }
    }

    /// The standard outcome for an engine call that did not finish.
    pub fn unfinished<T>(w: &Waited<T>) -> OperationOutcome {
        match w {
            Waited::Cancelled => OperationOutcome {
                result: OperationResult::Cancelled,
                diags: Diagnostics::new().with(Diagnostic::error(
                    DiagClass::Interrupted,
                    "Operation cancelled",
                    "The operation was cancelled before the engine finished. Resources being changed at that moment may not be recorded in the state.",
                )),
                ..OperationOutcome::default()
            },
            Waited::Crashed | Waited::Done(_) => OperationOutcome::failure(Diagnostics::new().with(Diagnostic::bug(
                "Engine call ended without a result",
                "The evaluation engine stopped before returning.",
            ))),
        }
    }

    /// Guard for commands that would treat a missing configuration as
    /// "destroy everything".
    pub fn require_config(&self, command: &str, gerund: &str, hint: &str) -> Option<OperationOutcome> {
        if self.op.has_config() || self.op.plan_file().is_some() || self.op.mode() == PlanMode::Destroy {
            return None;
        }
        Some(OperationOutcome::failure(Diagnostics::new().with(Diagnostic::error(
            DiagClass::UserInput,
            "No configuration files",
            format!(
                "{command} requires configuration to be present. {gerund} without a configuration would mark everything for destruction, which is normally not what is desired. {hint}"
            ),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::encryption::Disabled;
    use serde_json::json;

    fn backend(settings: &Settings, cfg: Value) -> Result<LocalBackend, Diagnostics> {
        LocalBackend::from_init(&BackendInit {
            type_name: "local",
            config: &cfg,
            settings,
            encryption: Arc::new(Disabled),
        })
    }

    #[test]
    fn default_paths_and_backup() {
        let s = Settings::for_dir("/work");
        let b = backend(&s, json!({})).ok().unwrap();
        let (state, out, backup) = b.state_paths("default");
        assert_eq!(state, PathBuf::from("/work/terraform.tfstate"));
        assert_eq!(out, state);
        assert_eq!(backup, Some(PathBuf::from("/work/terraform.tfstate.backup")));
        let (ws, _, _) = b.state_paths("staging");
        assert_eq!(ws, PathBuf::from("/work/terraform.tfstate.d/staging/terraform.tfstate"));
    }

    #[test]
    fn flags_override_paths_and_dash_disables_backup() {
        let mut s = Settings::for_dir("/work");
        s.paths.state = Some(PathBuf::from("in.tfstate"));
        s.paths.state_out = Some(PathBuf::from("/out/out.tfstate"));
        s.paths.backup = Some(PathBuf::from("-"));
        let b = backend(&s, json!({"path": "ignored.tfstate"})).ok().unwrap();
        let (state, out, backup) = b.state_paths("default");
        assert_eq!(state, PathBuf::from("/work/in.tfstate"));
        assert_eq!(out, PathBuf::from("/out/out.tfstate"));
        assert_eq!(backup, None);
    }

    #[test]
    fn rejects_unknown_arguments() {
        let s = Settings::for_dir("/work");
        let err = backend(&s, json!({"bucket": "x"})).err().unwrap();
        assert!(err.error_message().contains("bucket"));
        assert!(backend(&s, json!({"path": 3})).is_err());
    }
}
