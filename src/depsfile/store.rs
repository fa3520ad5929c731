//! Reading and replacing the dependency lock file of a root module.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::constants::{CLI_NAME, DEPENDENCY_LOCK_FILE};
use crate::fs::atomic::write_atomic;
use crate::types::addrs::Provider;
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::types::errors::{Error, ErrorKind, Result};

use super::locks::Locks;
use super::parse::parse_locks;
use super::write::render_locks;

/// The three sources that exempt a provider from hash verification.
#[derive(Clone, Debug, Default)]
pub struct ProviderOverrides {
    /// Developer overrides from the CLI configuration: provider -> local build directory.
    pub dev: BTreeMap<Provider, PathBuf>,
    /// Providers substituted by a test harness.
    pub test: BTreeSet<Provider>,
    /// Providers whose plugin processes are started by the caller.
    pub unmanaged: BTreeSet<Provider>,
}

impl ProviderOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dev.is_empty() && self.test.is_empty() && self.unmanaged.is_empty()
    }

    /// Warning to flush before any operation runs with developer overrides active.
    #[must_use]
    pub fn runtime_warnings(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if self.dev.is_empty() {
            return diags;
        }
        let mut detail =
            String::from("The following provider development overrides are set in the CLI configuration:\n");
        for (addr, path) in &self.dev {
            let _ = writeln!(detail, " - {} in {}", addr.for_display(), path.display());
        }
        detail.push_str(
            "\nThe behavior may therefore not match any released version of the provider and applying changes may cause the state to become incompatible with published releases.",
        );
        diags.push(Diagnostic::warning("Provider development overrides are in effect", detail));
        diags
    }
}

/// Lock file of one root module directory.
#[derive(Clone, Debug)]
pub struct DependencyLockStore {
    dir: PathBuf,
    overrides: ProviderOverrides,
}

impl DependencyLockStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overrides: ProviderOverrides::default(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ProviderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(DEPENDENCY_LOCK_FILE)
    }

    #[must_use]
    pub fn overrides(&self) -> &ProviderOverrides {
        &self.overrides
    }

    /// Read the lock file. A missing file is an empty lock set without
    /// diagnostics. Entries from the predecessor registry are migrated in
    /// memory, with one warning listing every rewritten address.
    pub fn load(&self) -> (Locks, Diagnostics) {
        let path = self.path();
        let mut diags = Diagnostics::new();
        let src = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (Locks::new(), diags),
            Err(e) => {
                diags.push(Diagnostic::error(
                    DiagClass::Configuration,
                    "Failed to read dependency lock file",
                    format!("Error reading {}: {e}.", path.display()),
                ));
                return (Locks::new(), diags);
            }
        };
        let mut locks = match parse_locks(&src, &path.display().to_string()) {
            Ok(l) => l,
            Err(e) => {
                diags.push(Diagnostic::error(
                    DiagClass::Configuration,
                    "Invalid dependency lock file",
                    format!(
                        "The dependency lock file {} is malformed: {}\n\nTo regenerate it, remove the file and run \"{CLI_NAME} init\".",
                        path.display(),
                        e.msg
                    ),
                ));
                return (Locks::new(), diags);
            }
        };
        let changes = locks.upgrade_from_predecessor_project();
        if !changes.is_empty() {
            diags.push(migration_warning(&changes));
        }
        (locks, diags)
    }

    /// [`load`](Self::load) followed by [`annotate_overrides`](Self::annotate_overrides).
    pub fn load_annotated(&self) -> (Locks, Diagnostics) {
        let (locks, diags) = self.load();
        (self.annotate_overrides(locks), diags)
    }

    /// Recompute the override markers from this store's override sources.
    /// Previous markers are discarded; versions and hashes are untouched.
    #[must_use]
    pub fn annotate_overrides(&self, locks: Locks) -> Locks {
        let mut out = Locks::new();
        for (addr, lock) in locks.all_providers() {
            out.set_provider(
                addr.clone(),
                lock.version().clone(),
                lock.constraints().map(str::to_string),
                lock.hashes().to_vec(),
            );
        }
        let marked = self
            .overrides
            .dev
            .keys()
            .chain(&self.overrides.test)
            .chain(&self.overrides.unmanaged);
        for addr in marked {
            out.set_provider_overridden(addr.clone());
        }
        out
    }

    /// Rewrite the whole lock file atomically.
    ///
    /// # Errors
    /// Returns `ErrorKind::Io` if the file cannot be written.
    pub fn replace(&self, locks: &Locks) -> Result<()> {
        let path = self.path();
        write_atomic(&path, render_locks(locks).as_bytes(), 0o644).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                format!("failed to update dependency lock file {}: {e}", path.display()),
            )
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn migration_warning(changes: &BTreeMap<Provider, Provider>) -> Diagnostic {
    let mut detail = String::from(
        "The following provider entries in the dependency lock file refer to the predecessor project's registry and were migrated:\n",
    );
    for (old, new) in changes {
        let _ = writeln!(detail, "  - {old} -> {new}");
    }
    let _ = write!(
        detail,
        "\nThe selected versions were kept. The checksums were not, because packages from the two registries are not byte-for-byte identical; run \"{CLI_NAME} init\" to record new checksums."
    );
    Diagnostic::warning("Dependency lock file entries automatically migrated", detail)
}
