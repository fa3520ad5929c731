//! Invocation settings.
//!
//! `Settings` is assembled once per invocation from defaults, environment
//! and command arguments, then passed by reference into every stage.
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_PARALLELISM, DEFAULT_WORKSPACE};
use crate::types::errors::{Error, ErrorKind, Result};

pub mod types;

pub use types::{Locking, Runtime, StatePaths};

/// Settings grouped by concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Root module directory.
    pub config_dir: PathBuf,
    pub locking: Locking,
    pub paths: StatePaths,
    pub runtime: Runtime,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
            locking: Locking {
                enabled: true,
                timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            },
            paths: StatePaths::default(),
            runtime: Runtime {
                parallelism: DEFAULT_PARALLELISM,
                input_enabled: true,
                running_in_automation: false,
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                workspace: DEFAULT_WORKSPACE.to_string(),
            },
        }
    }
}

fn truthy(v: &str) -> bool {
    !v.is_empty() && !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no")
}

impl Settings {
    /// Defaults rooted at `config_dir`; the data directory is resolved inside it.
    #[must_use]
    pub fn for_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let mut s = Self::default();
        s.runtime.data_dir = config_dir.join(DEFAULT_DATA_DIR);
        s.config_dir = config_dir;
        s
    }

    /// Settings for unattended pipelines: no prompts, automation-style hints.
    #[must_use]
    pub fn automation_preset(config_dir: impl Into<PathBuf>) -> Self {
        let mut s = Self::for_dir(config_dir);
        s.runtime.input_enabled = false;
        s.runtime.running_in_automation = true;
        s
    }

    /// Apply `TF_IN_AUTOMATION`, `TF_INPUT`, `TF_DATA_DIR` and `TF_WORKSPACE`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Ok(v) = std::env::var("TF_IN_AUTOMATION") {
            self.runtime.running_in_automation = truthy(&v);
        }
        if let Ok(v) = std::env::var("TF_INPUT") {
            self.runtime.input_enabled = truthy(&v);
        }
        if let Some(v) = std::env::var_os("TF_DATA_DIR").filter(|v| !v.is_empty()) {
            let p = PathBuf::from(v);
            self.runtime.data_dir = if p.is_absolute() { p } else { self.config_dir.join(p) };
        }
        if let Ok(v) = std::env::var("TF_WORKSPACE") {
            if !v.is_empty() {
                self.runtime.workspace = v;
            }
        }
        self
    }

    /// `Settings::for_dir(dir).with_env()`.
    #[must_use]
    pub fn from_env(config_dir: impl Into<PathBuf>) -> Self {
        Self::for_dir(config_dir).with_env()
    }
}

/// Parse a `-lock-timeout` style duration: `0`, `0s`, `500ms`, `30s`, `2m`, `1h`.
///
/// # Errors
/// Returns `ErrorKind::Parse` for unknown units, missing units or values that overflow.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s).map_err(|e| Error::new(ErrorKind::Parse, format!("invalid duration {s:?}: {e}")))
}
