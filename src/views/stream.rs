use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;

use crate::types::diagnostics::Diagnostics;
use crate::types::plan::{ChangeAction, Plan, PlanMode, ResourceCounts};
use crate::types::state::OutputValue;

use super::{SummaryKind, View};

/// Plain-text view: warnings and messages to `out`, errors to `err`.
pub struct StreamView {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
}

impl StreamView {
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    #[must_use]
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    fn write_out(&self, text: &str) {
        if let Ok(mut w) = self.out.lock() {
            let _ = w.write_all(text.as_bytes());
            let _ = w.flush();
        }
    }

    fn write_err(&self, text: &str) {
        if let Ok(mut w) = self.err.lock() {
            let _ = w.write_all(text.as_bytes());
            let _ = w.flush();
        }
    }
}

fn action_phrase(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::NoOp => "will be left unchanged",
        ChangeAction::Create => "will be created",
        ChangeAction::Update => "will be updated in-place",
        ChangeAction::Delete => "will be destroyed",
        ChangeAction::Replace => "must be replaced",
    }
}

impl View for StreamView {
    fn diagnostics(&self, diags: &Diagnostics) {
        for d in diags {
            let text = format!("\n{d}\n");
            if d.is_error() {
                self.write_err(&text);
            } else {
                self.write_out(&text);
            }
        }
    }

    fn message(&self, msg: &str) {
        self.write_out(&format!("{msg}\n"));
    }

    fn cancelled(&self, mode: PlanMode) {
        match mode {
            PlanMode::Destroy => self.write_out("Destroy cancelled.\n"),
            _ => self.write_out("Apply cancelled.\n"),
        }
    }

    fn plan(&self, plan: &Plan) {
        if !plan.has_changes() {
            self.write_out("\nNo changes. Your infrastructure matches the configuration.\n");
            return;
        }
        let mut text = String::from("\nThe following actions will be performed:\n\n");
        for ch in plan.changes.iter().filter(|c| c.action != ChangeAction::NoOp) {
            text.push_str(&format!("  # {} {}\n", ch.address, action_phrase(ch.action)));
        }
        let c = ResourceCounts::of_plan(plan);
        text.push_str(&format!(
            "\nPlan: {} to add, {} to change, {} to destroy.\n",
            c.added, c.changed, c.destroyed
        ));
        self.write_out(&text);
    }

    fn resource_count(&self, kind: SummaryKind, counts: ResourceCounts) {
        let text = match kind {
            SummaryKind::Destroy => format!("\nDestroy complete! Resources: {} destroyed.\n", counts.destroyed),
            SummaryKind::Apply | SummaryKind::Refresh => format!(
                "\nApply complete! Resources: {} added, {} changed, {} destroyed.\n",
                counts.added, counts.changed, counts.destroyed
            ),
        };
        self.write_out(&text);
    }

    fn outputs(&self, outputs: &BTreeMap<String, OutputValue>) {
        if outputs.is_empty() {
            return;
        }
        let mut text = String::from("\nOutputs:\n\n");
        for (name, out) in outputs {
            if out.sensitive {
                text.push_str(&format!("{name} = <sensitive>\n"));
            } else {
                text.push_str(&format!("{name} = {}\n", out.value));
            }
        }
        self.write_out(&text);
    }
}
