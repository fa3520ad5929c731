//! Deterministic UUIDv5 identifiers for operations.
//!
//! The UUID namespace is derived from a stable tag (`NS_TAG`) so that
//! `operation_id` is reproducible across runs for the same request, which
//! keeps facts from repeated invocations comparable.
use std::fmt::Write;
use uuid::Uuid;

use crate::constants::NS_TAG;

use super::addrs::Target;
use super::plan::PlanMode;

fn namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, NS_TAG.as_bytes())
}

fn mode_tag(mode: PlanMode) -> &'static str {
    match mode {
        PlanMode::Normal => "N",
        PlanMode::Destroy => "D",
        PlanMode::RefreshOnly => "R",
    }
}

/// Compute a deterministic UUIDv5 for an operation request.
///
/// Targets and excludes are serialized in the order given; callers sort them
/// when building the operation.
#[must_use]
pub fn operation_id(
    kind: &str,
    mode: PlanMode,
    plan_path: Option<&str>,
    targets: &[Target],
    excludes: &[Target],
) -> Uuid {
    let mut s = format!("{kind}:{}", mode_tag(mode));
    if let Some(p) = plan_path {
        let _ = write!(s, "|plan={p}");
    }
    for t in targets {
        let _ = write!(s, "|+{t}");
    }
    for t in excludes {
        let _ = write!(s, "|-{t}");
    }
    Uuid::new_v5(&namespace(), s.as_bytes())
}
