//! Application error reported by command preconditions.

use thiserror::Error;

const NO_DETAIL: &str = "No details given";

/// An error raised in the context of the application, typically when a
/// command precondition is violated.
///
/// Carries a human-readable `reason` and an optional `detail` giving more
/// insight into why the error happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct AppError {
    reason: String,
    detail: Option<String>,
}

impl AppError {
    /// Creates an error with the given reason and no detail.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            detail: None,
        }
    }

    /// Attaches a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Replaces the detail string.
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }

    /// Returns the reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the detail, or `"No details given"` when none was attached.
    pub fn detail(&self) -> &str {
        self.detail.as_deref().unwrap_or(NO_DETAIL)
    }
}
