use thiserror::Error;

use crate::types::diagnostics::{DiagClass, Diagnostics};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    UserInput(String),
    #[error("plan file error: {0}")]
    PlanFile(String),
    #[error("state lock error: {0}")]
    Locking(String),
    #[error("backend configuration error: {0}")]
    BackendConfig(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<crate::types::errors::Error> for ApiError {
    fn from(e: crate::types::errors::Error) -> Self {
        use crate::types::errors::ErrorKind::{Encryption, Internal, InvalidPath, Io, Locking, Parse};
        match e.kind {
            InvalidPath => ApiError::UserInput(e.msg),
            Parse | Encryption => ApiError::PlanFile(e.msg),
            Locking => ApiError::Locking(e.msg),
            Internal => ApiError::Internal(e.msg),
            Io => ApiError::Io(e.msg),
        }
    }
}

// Stable identifiers emitted in facts. SCREAMING_SNAKE_CASE matches the
// emitted strings.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorId {
    E_USER_INPUT,
    E_PLAN_FILE,
    E_LOCKING,
    E_BACKEND_CONFIG,
    E_INTERNAL,
    E_BACKEND,
    E_INTERRUPTED,
    E_GENERIC,
}

#[must_use]
pub const fn id_str(id: ErrorId) -> &'static str {
    match id {
        ErrorId::E_USER_INPUT => "E_USER_INPUT",
        ErrorId::E_PLAN_FILE => "E_PLAN_FILE",
        ErrorId::E_LOCKING => "E_LOCKING",
        ErrorId::E_BACKEND_CONFIG => "E_BACKEND_CONFIG",
        ErrorId::E_INTERNAL => "E_INTERNAL",
        ErrorId::E_BACKEND => "E_BACKEND",
        ErrorId::E_INTERRUPTED => "E_INTERRUPTED",
        ErrorId::E_GENERIC => "E_GENERIC",
    }
}

/// Every failure exits 1; the ID, not the code, carries the category.
#[must_use]
pub const fn exit_code_for(_id: ErrorId) -> i32 {
    1
}

#[must_use]
pub const fn id_for_class(class: DiagClass) -> ErrorId {
    match class {
        DiagClass::UserInput => ErrorId::E_USER_INPUT,
        DiagClass::Contention => ErrorId::E_LOCKING,
        DiagClass::Configuration => ErrorId::E_BACKEND_CONFIG,
        DiagClass::InvariantViolation => ErrorId::E_INTERNAL,
        DiagClass::Backend => ErrorId::E_BACKEND,
        DiagClass::Interrupted => ErrorId::E_INTERRUPTED,
        DiagClass::Generic => ErrorId::E_GENERIC,
    }
}

/// ID of the first error in `diags`, if any.
#[must_use]
pub fn id_for_diags(diags: &Diagnostics) -> Option<ErrorId> {
    diags.error_class().map(id_for_class)
}
