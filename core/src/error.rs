use std::time::Duration;

use crate::catalog::IssueType;

/// Failure of a single signal checker call.
///
/// None of these abort a diagnostic run. They only decide how the signal is
/// recorded: not applicable signals drop out of scoring entirely, failures and
/// timeouts become unknown evidence with zero reliability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckerError {
    /// The check has no meaning on this platform (e.g. a bridge app on an OS that has none)
    #[error("not applicable on this platform")]
    NotApplicable,
    /// The checker ran and reported an error
    #[error("check failed: {0}")]
    Failed(String),
    /// The checker did not settle within the per-call timeout
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl CheckerError {
    /// Stable machine code for the outcome this error maps to.
    pub fn code(&self) -> &'static str {
        match self {
            CheckerError::NotApplicable => codes::NOT_APPLICABLE,
            CheckerError::Failed(_) => codes::CHECK_FAILED,
            CheckerError::TimedOut(_) => codes::TIMED_OUT,
        }
    }
}

/// Rejected issue catalog. Raised once, when an engine is built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{issue}: {field} must be a finite value in [0, 1], got {value}")]
    OutOfRange {
        issue: IssueType,
        field: &'static str,
        value: f64,
    },
    #[error("{0} is declared more than once")]
    DuplicateIssue(IssueType),
    #[error("causal link {cause} -> {effect} references an issue missing from the catalog")]
    DanglingLink { cause: IssueType, effect: IssueType },
}

/// Outcome codes used across reports and CLI output
pub mod codes {
    pub const CHECKED: &str = "checked";
    pub const NOT_APPLICABLE: &str = "not_applicable";
    pub const CHECK_FAILED: &str = "check_failed";
    pub const TIMED_OUT: &str = "timed_out";
}
