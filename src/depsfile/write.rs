//! Deterministic serializer for the dependency lock file.
//!
//! Output is sorted by provider address. Override markers are not part of
//! the file format and are never written.
use std::fmt::Write;

use crate::constants::CLI_NAME;
use crate::hcl::quote;

use super::locks::Locks;

#[must_use]
pub fn render_locks(locks: &Locks) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# This file is maintained automatically by \"{CLI_NAME} init\".");
    out.push_str("# Manual edits may be lost in future updates.\n");
    for (addr, lock) in locks.all_providers() {
        out.push('\n');
        let _ = writeln!(out, "provider {} {{", quote(&addr.to_string()));
        if let Some(c) = lock.constraints() {
            let _ = writeln!(out, "  version     = {}", quote(&lock.version().to_string()));
            let _ = writeln!(out, "  constraints = {}", quote(c));
        } else {
            let _ = writeln!(out, "  version = {}", quote(&lock.version().to_string()));
        }
        if !lock.hashes().is_empty() {
            out.push_str("  hashes = [\n");
            for h in lock.hashes() {
                let _ = writeln!(out, "    {},", quote(h.as_str()));
            }
            out.push_str("  ]\n");
        }
        out.push_str("}\n");
    }
    out
}
