//! Sourceless diagnostics accumulated across the stages of an invocation.
//!
//! Every diagnostic carries a [`DiagClass`] so callers can tell user mistakes,
//! lock contention, configuration problems and internal bugs apart without
//! matching on message text.
use std::fmt;

use serde::Serialize;

use super::errors::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Failure taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagClass {
    /// Bad plan path, directory given for a plan, destroy with a saved plan.
    UserInput,
    /// The state lock is held elsewhere or could not be released.
    Contention,
    /// Backend misconfiguration, missing providers, stale initialization.
    Configuration,
    /// Internal bug: no valid user action produces this condition.
    InvariantViolation,
    /// Errors reported by the backend or the evaluation engine while running.
    Backend,
    /// The operation was interrupted or declined.
    Interrupted,
    Generic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub class: DiagClass,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn error(class: DiagClass, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            class,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            class: DiagClass::Generic,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// An internal-bug diagnostic. The summary is kept as given; callers are
    /// expected to say in the detail which component is at fault.
    pub fn bug(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::error(DiagClass::InvariantViolation, summary, detail)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{label}: {}", self.summary)?;
        if !self.detail.is_empty() {
            write!(f, "\n\n{}", self.detail)?;
        }
        Ok(())
    }
}

impl From<Error> for Diagnostic {
    fn from(e: Error) -> Self {
        let class = match e.kind {
            ErrorKind::InvalidPath | ErrorKind::Parse => DiagClass::UserInput,
            ErrorKind::Locking => DiagClass::Contention,
            ErrorKind::Encryption => DiagClass::Configuration,
            ErrorKind::Internal => DiagClass::InvariantViolation,
            ErrorKind::Io => DiagClass::Generic,
        };
        Self::error(class, e.msg, String::new())
    }
}

/// Ordered collector threaded through every stage of an invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Diagnostic) {
        self.0.push(d);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn with(mut self, d: Diagnostic) -> Self {
        self.push(d);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    /// Class of the first error, if any.
    #[must_use]
    pub fn error_class(&self) -> Option<DiagClass> {
        self.errors().next().map(|d| d.class)
    }

    /// Remove and return the warnings, leaving errors in place.
    pub fn take_warnings(&mut self) -> Diagnostics {
        let (warn, keep): (Vec<_>, Vec<_>) = self.0.drain(..).partition(|d| !d.is_error());
        self.0 = keep;
        Diagnostics(warn)
    }

    /// Errors joined into a single message, for callers that want an `Error`.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.errors()
            .map(|d| {
                if d.detail.is_empty() {
                    d.summary.clone()
                } else {
                    format!("{}: {}", d.summary, d.detail)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(d: Diagnostic) -> Self {
        Self(vec![d])
    }
}

impl From<Error> for Diagnostics {
    fn from(e: Error) -> Self {
        Self(vec![e.into()])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{d}")?;
        }
        Ok(())
    }
}
