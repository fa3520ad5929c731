//! Output sink, hooks and approval prompt consumed by the execution core.
//!
//! Rendering is owned elsewhere; these traits are the narrow seams the core
//! writes through. [`StreamView`] is a plain-text implementation.
use std::collections::BTreeMap;

use crate::types::diagnostics::Diagnostics;
use crate::types::errors::Result;
use crate::types::plan::{Plan, PlanMode, ResourceCounts};
use crate::types::state::OutputValue;

pub mod hooks;
pub mod stream;

pub use hooks::{CountHook, Hook};
pub use stream::StreamView;

/// Which command produced a summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryKind {
    Apply,
    Destroy,
    Refresh,
}

pub trait View: Send + Sync {
    fn diagnostics(&self, diags: &Diagnostics);

    /// Informational line, e.g. lock progress or interrupt notices.
    fn message(&self, msg: &str);

    /// The operation was cancelled or the plan was not approved.
    fn cancelled(&self, mode: PlanMode);

    fn plan(&self, plan: &Plan);

    fn resource_count(&self, kind: SummaryKind, counts: ResourceCounts);

    fn outputs(&self, outputs: &BTreeMap<String, OutputValue>);
}

/// Interactive confirmation.
pub trait ApprovalPrompt: Send + Sync {
    /// Ask `query` with `description` and return the raw answer.
    ///
    /// # Errors
    /// Returns an error if input cannot be read.
    fn ask(&self, query: &str, description: &str) -> Result<String>;
}
