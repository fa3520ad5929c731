use std::path::Path;

use log::Level;
use serde_json::json;

use crate::api::errors::ErrorId;
use crate::api::OpCore;
use crate::constants::CLI_NAME;
use crate::logging::audit::AuditCtx;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::planfile::{open_path, WrappedPlanFile};
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};
use crate::types::errors::ErrorKind;

pub(super) fn load<E: FactsEmitter, A: AuditSink>(
    api: &OpCore<E, A>,
    ctx: &AuditCtx<'_>,
    path: &Path,
) -> (Option<WrappedPlanFile>, Diagnostics) {
    let slog = StageLogger::new(ctx);
    let shown = path.display().to_string();
    let mut diags = Diagnostics::new();
    match open_path(path, api.encryption.as_ref()) {
        Ok(Some(pf)) => {
            let kind = if pf.local().is_some() { "local" } else { "cloud" };
            slog.plan_file_load()
                .path(shown)
                .field("plan_kind", json!(kind))
                .emit_success();
            (Some(pf), diags)
        }
        Ok(None) => {
            diags.push(Diagnostic::error(
                DiagClass::UserInput,
                format!("Failed to load \"{shown}\" as a plan file"),
                format!(
                    "The specified path is a directory, not a plan file. You can use the global -chdir flag to use this directory as the configuration root. For example: {CLI_NAME} -chdir=\"{shown}\" apply"
                ),
            ));
            slog.plan_file_load()
                .path(shown)
                .field("directory", json!(true))
                .error_id(ErrorId::E_USER_INPUT)
                .emit_failure();
            (None, diags)
        }
        Err(e) => {
            let (class, id) = match e.kind {
                ErrorKind::InvalidPath => (DiagClass::UserInput, ErrorId::E_USER_INPUT),
                ErrorKind::Encryption => (DiagClass::Configuration, ErrorId::E_PLAN_FILE),
                _ => (DiagClass::UserInput, ErrorId::E_PLAN_FILE),
            };
            api.audit.log(Level::Error, &format!("plan file {shown}: {}", e.msg));
            diags.push(Diagnostic::error(
                class,
                format!("Failed to load \"{shown}\" as a plan file"),
                format!("Error: {}", e.msg),
            ));
            slog.plan_file_load()
                .path(shown)
                .field("error", json!(e.msg))
                .error_id(id)
                .emit_failure();
            (None, diags)
        }
    }
}
