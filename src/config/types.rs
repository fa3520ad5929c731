use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Locking {
    /// `-lock`: when false the no-op locker is used.
    pub enabled: bool,
    /// `-lock-timeout`: total time to keep retrying a held lock.
    pub timeout: Duration,
}

/// Where the local backend reads and writes state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatePaths {
    /// `-state`: input state path; `None` means the backend default.
    pub state: Option<PathBuf>,
    /// `-state-out`: output path; `None` means same as the input path.
    pub state_out: Option<PathBuf>,
    /// `-backup`: `None` derives `<state_out>.backup`; `Some("-")` disables backups.
    pub backup: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Runtime {
    /// `-parallelism`, passed through to the evaluation engine.
    pub parallelism: usize,
    /// `-input`: whether interactive prompts may be shown.
    pub input_enabled: bool,
    /// `TF_IN_AUTOMATION`: adjust remediation hints for unattended runs.
    pub running_in_automation: bool,
    /// Working data directory holding the backend-state record.
    pub data_dir: PathBuf,
    pub workspace: String,
}
