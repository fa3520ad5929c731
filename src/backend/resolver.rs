//! Choosing the backend for an invocation.
//!
//! A local plan carries the backend configuration that produced it and is
//! trusted as-is. Otherwise the root module's backend block is reconciled
//! with the backend-state record left by `init`.
use std::sync::Arc;

use serde_json::Value;

use crate::config::Settings;
use crate::constants::CLI_NAME;
use crate::encryption::Encryption;
use crate::engine::{BackendConfig, ConfigLoader};
use crate::planfile::WrappedPlanFile;
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};

use super::init::{BackendInit, Registry};
use super::state::{clear_record, load_record, save_record, BackendRecord};
use super::Backend;

/// Where the backend configuration came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendSource {
    /// Embedded in a local plan file.
    Plan,
    /// The root module's backend block, matching the recorded one.
    Config,
    /// Nothing configured: `local` with an empty body.
    Synthetic,
}

pub struct Resolved {
    pub backend: Arc<dyn Backend>,
    pub record: BackendRecord,
    pub source: BackendSource,
    pub workspace: String,
    /// Non-fatal diagnostics from loading the root module's backend block.
    pub warnings: Diagnostics,
}

pub struct BackendResolver<'a> {
    registry: &'a Registry,
    loader: &'a dyn ConfigLoader,
    settings: &'a Settings,
    encryption: Arc<dyn Encryption>,
}

fn bug_missing_backend() -> Diagnostic {
    Diagnostic::bug(
        "Failed to read plan from plan file",
        "The given plan file does not have a valid backend configuration. This is a bug in the OpenTofu command that generated this plan file.",
    )
}

fn init_required(reason: &str) -> Diagnostic {
    Diagnostic::error(
        DiagClass::Configuration,
        format!("Backend initialization required, please run \"{CLI_NAME} init\""),
        format!(
            "Reason: {reason}\n\nThe \"backend\" is the interface that OpenTofu uses to store state and perform operations. \
             Changes to backend configurations require reinitialization. Please run \"{CLI_NAME} init\" with either the \
             \"-reconfigure\" or \"-migrate-state\" flags to use the current configuration.\n\nIf the change reason above is \
             incorrect, please verify your configuration hasn't changed and try again. At this point, no changes to your \
             existing configuration or state have been made."
        ),
    )
}

fn config_changed() -> Diagnostic {
    Diagnostic::error(
        DiagClass::Configuration,
        "Backend configuration changed",
        format!(
            "A change in the backend configuration has been detected, which may require migrating existing state.\n\n\
             If you wish to attempt automatic migration of the state, use \"{CLI_NAME} init -migrate-state\".\n\
             If you wish to store the current configuration with no changes to the state, use \"{CLI_NAME} init -reconfigure\"."
        ),
    )
}

impl<'a> BackendResolver<'a> {
    #[must_use]
    pub fn new(
        registry: &'a Registry,
        loader: &'a dyn ConfigLoader,
        settings: &'a Settings,
        encryption: Arc<dyn Encryption>,
    ) -> Self {
        Self {
            registry,
            loader,
            settings,
            encryption,
        }
    }

    fn build(&self, type_name: &str, config: &Value) -> Result<Arc<dyn Backend>, Diagnostics> {
        self.registry.init(&BackendInit {
            type_name,
            config,
            settings: self.settings,
            encryption: self.encryption.clone(),
        })
    }

    fn declared(&self) -> Result<(Option<BackendConfig>, Diagnostics), Diagnostics> {
        let (cfg, diags) = self.loader.load_backend_config(&self.settings.config_dir);
        if diags.has_errors() {
            return Err(diags);
        }
        Ok((cfg, diags))
    }

    fn recorded(&self) -> Result<Option<BackendRecord>, Diagnostics> {
        load_record(&self.settings.runtime.data_dir).map_err(|e| {
            Diagnostics::new().with(Diagnostic::error(
                DiagClass::Configuration,
                "Failed to load backend state",
                format!(
                    "The working directory's backend state could not be read: {}.\n\nRun \"{CLI_NAME} init\" to reinitialize it.",
                    e.msg
                ),
            ))
        })
    }

    /// Backend for an operation, from `plan` when it is a local plan and
    /// from the root module otherwise.
    ///
    /// # Errors
    /// Returns diagnostics classified as user input, configuration or
    /// invariant violation.
    pub fn resolve(&self, plan: Option<&WrappedPlanFile>) -> Result<Resolved, Diagnostics> {
        match plan {
            Some(WrappedPlanFile::Local(local)) => {
                let p = local.read_plan().map_err(|e| {
                    Diagnostics::new().with(Diagnostic::error(
                        DiagClass::UserInput,
                        "Failed to read plan from plan file",
                        format!("Cannot read the plan from the given plan file: {}.", e.msg),
                    ))
                })?;
                let Some((pb, cfg)) = p.backend_config() else {
                    return Err(Diagnostics::new().with(bug_missing_backend()));
                };
                let backend = self.build(&pb.type_name, cfg)?;
                Ok(Resolved {
                    backend,
                    record: BackendRecord::new(pb.type_name.clone(), cfg.clone()),
                    source: BackendSource::Plan,
                    workspace: pb.workspace.clone(),
                    warnings: Diagnostics::new(),
                })
            }
            Some(WrappedPlanFile::Cloud { path, plan }) => {
                let resolved = self.from_config()?;
                if !resolved.backend.remote_reporter().is_present() {
                    return Err(Diagnostics::new().with(Diagnostic::error(
                        DiagClass::Configuration,
                        "Saved plan requires a remote backend",
                        format!(
                            "The plan file {} refers to run {} on {}, but the configured \"{}\" backend cannot run remote operations.",
                            path.display(),
                            plan.run_id,
                            plan.hostname,
                            resolved.record.type_name
                        ),
                    )));
                }
                Ok(resolved)
            }
            None => self.from_config(),
        }
    }

    fn from_config(&self) -> Result<Resolved, Diagnostics> {
        let (declared, warnings) = self.declared()?;
        let recorded = self.recorded()?;
        let (record, source) = match (declared, recorded) {
            (None, None) => (BackendRecord::local(), BackendSource::Synthetic),
            (None, Some(rec)) => {
                return Err(Diagnostics::new().with(init_required(&format!(
                    "Unsetting the previously set backend \"{}\"",
                    rec.type_name
                ))))
            }
            (Some(cfg), None) => {
                return Err(Diagnostics::new().with(init_required(&format!(
                    "Initial configuration of the requested backend \"{}\"",
                    cfg.type_name
                ))))
            }
            (Some(cfg), Some(rec)) => {
                if cfg.type_name != rec.type_name || cfg.config != rec.config {
                    return Err(Diagnostics::new().with(config_changed()));
                }
                (rec, BackendSource::Config)
            }
        };
        let backend = self.build(&record.type_name, &record.config)?;
        Ok(Resolved {
            backend,
            record,
            source,
            workspace: self.settings.runtime.workspace.clone(),
            warnings,
        })
    }

    /// `init`: adopt the declared backend and persist the record. Removing
    /// the backend block clears the record.
    ///
    /// # Errors
    /// Returns diagnostics if the backend cannot be built or recorded.
    pub fn initialize(&self) -> Result<Resolved, Diagnostics> {
        let (declared, warnings) = self.declared()?;
        let data_dir = &self.settings.runtime.data_dir;
        let persist_err = |e: crate::types::errors::Error| {
            Diagnostics::new().with(Diagnostic::error(
                DiagClass::Configuration,
                "Failed to save backend state",
                format!("The backend configuration could not be recorded in {}: {}.", data_dir.display(), e.msg),
            ))
        };
        let Some(cfg) = declared else {
            clear_record(data_dir).map_err(persist_err)?;
            let record = BackendRecord::local();
            return Ok(Resolved {
                backend: self.build(&record.type_name, &record.config)?,
                record,
                source: BackendSource::Synthetic,
                workspace: self.settings.runtime.workspace.clone(),
                warnings,
            });
        };
        let record = BackendRecord::new(cfg.type_name, cfg.config);
        let backend = self.build(&record.type_name, &record.config)?;
        save_record(data_dir, &record).map_err(persist_err)?;
        Ok(Resolved {
            backend,
            record,
            source: BackendSource::Config,
            workspace: self.settings.runtime.workspace.clone(),
            warnings,
        })
    }
}
