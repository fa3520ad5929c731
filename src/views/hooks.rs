use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::plan::{ChangeAction, ResourceCounts};

/// Callbacks the evaluation engine invokes around each resource change.
pub trait Hook: Send + Sync {
    fn pre_apply(&self, _address: &str, _action: ChangeAction) {}

    /// `error` is set when the change failed.
    fn post_apply(&self, _address: &str, _action: ChangeAction, _error: Option<&str>) {}
}

/// Counts successfully applied changes for the closing summary.
#[derive(Debug, Default)]
pub struct CountHook {
    added: AtomicUsize,
    changed: AtomicUsize,
    destroyed: AtomicUsize,
}

impl CountHook {
    #[must_use]
    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            added: self.added.load(Ordering::SeqCst),
            changed: self.changed.load(Ordering::SeqCst),
            destroyed: self.destroyed.load(Ordering::SeqCst),
        }
    }
}

impl Hook for CountHook {
    fn post_apply(&self, _address: &str, action: ChangeAction, error: Option<&str>) {
        if error.is_some() {
            return;
        }
        match action {
            ChangeAction::NoOp => {}
            ChangeAction::Create => {
                self.added.fetch_add(1, Ordering::SeqCst);
            }
            ChangeAction::Update => {
                self.changed.fetch_add(1, Ordering::SeqCst);
            }
            ChangeAction::Delete => {
                self.destroyed.fetch_add(1, Ordering::SeqCst);
            }
            ChangeAction::Replace => {
                self.added.fetch_add(1, Ordering::SeqCst);
                self.destroyed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_changes_are_not_counted() {
        let h = CountHook::default();
        h.post_apply("a.a", ChangeAction::Create, None);
        h.post_apply("a.b", ChangeAction::Replace, None);
        h.post_apply("a.c", ChangeAction::Delete, Some("boom"));
        assert_eq!(h.counts(), ResourceCounts { added: 2, changed: 0, destroyed: 1 });
    }
}
