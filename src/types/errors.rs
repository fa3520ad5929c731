//! Error types used across opcore.
use thiserror::Error;

/// Error categories for low-level file, parse and lock operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("invalid path")]
    InvalidPath,
    #[error("io error")]
    Io,
    #[error("parse error")]
    Parse,
    #[error("locking error")]
    Locking,
    #[error("encryption error")]
    Encryption,
    #[error("internal error")]
    Internal,
}

/// Structured error with a kind and human message.
#[derive(Debug, Error)]
#[error("{kind:?}: {msg}")]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

/// Convenient alias for results returning a `types::Error`.
pub type Result<T> = std::result::Result<T, Error>;
