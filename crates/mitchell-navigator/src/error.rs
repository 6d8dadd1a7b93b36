//! Internal navigation error, distinct from [`mitchell_types::Error`]
//! because a clarification is not a failure in the crate-wide sense — it is
//! a structured, expected outcome the caller surfaces as data, per §7's
//! *ClarificationNeeded* row.

use mitchell_types::Clarification;

/// Why Phase 1 or Phase 2 stopped before reaching a confirmed vehicle.
#[derive(Debug, Clone)]
pub enum NavError {
    /// A required field was missing or unmatched, the selector failed to
    /// open, or the Options phase exceeded its step budget.
    Fail(String),
    /// A required field (Year/Make/Model) was entirely absent from the
    /// goal and a clarification callback is registered; carries the
    /// unresolved request for `NavigationResult::clarifications`.
    NeedsClarification(Clarification),
}

impl std::fmt::Display for NavError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavError::Fail(msg) => write!(f, "{msg}"),
            NavError::NeedsClarification(c) => write!(f, "clarification needed: {}", c.option_name),
        }
    }
}
