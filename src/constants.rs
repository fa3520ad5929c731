//! Shared crate-wide constants for opcore.
//!
//! Centralizes file names, registry hosts and timing knobs used across modules.
//! Adjusting these here will propagate through the crate.

/// Name of the command-line program, used in remediation hints (`run "tofu init"`).
pub const CLI_NAME: &str = "tofu";

/// Version string recorded in lock holder info and written plan artifacts.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default lock timeout. Zero means a single acquisition attempt, matching `-lock-timeout=0s`.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 0;

/// Initial poll interval for the state locker; doubles after every failed attempt.
pub const LOCK_POLL_MS: u64 = 25;

/// Upper bound for a single backoff sleep in the state locker.
pub const LOCK_BACKOFF_MAX_MS: u64 = 1_000;

/// How long the runner waits for a cancelled operation to wind down after a second interrupt.
pub const CANCEL_GRACE_MS: u64 = 5_000;

/// Polling interval used while waiting on a running operation.
pub const OPERATION_POLL_MS: u64 = 20;

/// Default `-parallelism` handed down to the evaluation engine.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Dependency lock file, relative to the root configuration directory.
pub const DEPENDENCY_LOCK_FILE: &str = ".terraform.lock.hcl";

/// Default working data directory (overridable with `TF_DATA_DIR`).
pub const DEFAULT_DATA_DIR: &str = ".terraform";

/// Backend-state record file name inside the data directory.
pub const BACKEND_STATE_FILE: &str = "terraform.tfstate";

/// Default state file for the local backend.
pub const DEFAULT_STATE_FILE: &str = "terraform.tfstate";

/// Extension appended to the output state path to form the default backup path.
pub const DEFAULT_BACKUP_EXTENSION: &str = ".backup";

/// Passing this as the backup path disables backups.
pub const BACKUP_DISABLED: &str = "-";

/// Recovery file written when the final state cannot be persisted.
pub const ERRORED_STATE_FILE: &str = "errored.tfstate";

/// Registry host providers default to when a source address omits it.
pub const DEFAULT_REGISTRY_HOST: &str = "registry.opentofu.org";

/// Registry host of the predecessor project whose lock entries are migrated on load.
pub const PREDECESSOR_REGISTRY_HOST: &str = "registry.terraform.io";

/// Namespace republished under the default registry host; only this namespace migrates.
pub const LEGACY_NAMESPACE: &str = "hashicorp";

/// Format tag of the plan artifact container.
pub const PLAN_FORMAT: &str = "opcore-plan";

/// Current plan artifact container version; other versions are rejected.
pub const PLAN_FORMAT_VERSION: u32 = 1;

/// Version of the persisted state document.
pub const STATE_FORMAT_VERSION: u32 = 4;

/// Version of the backend-state record.
pub const BACKEND_STATE_VERSION: u32 = 3;

/// Default workspace name.
pub const DEFAULT_WORKSPACE: &str = "default";

/// UUIDv5 namespace tag for deterministic operation IDs.
pub const NS_TAG: &str = "https://opcore.dev/operations";
