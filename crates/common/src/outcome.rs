//! Success/failure outcomes.
//!
//! Every kernel operation reports through [`std::result::Result`]: the two
//! arms are distinct variants, so matching on an outcome also narrows its
//! payload. This module adds the vocabulary used around it:
//!
//! - [`ok`] / [`fail`] construct the two arms
//! - [`fail_with`] attaches a typed failure payload next to the error
//! - [`Outcome`] exposes the success/failure flags and optional accessors
//!
//! The kernel crates only use [`ok`] and [`fail`]. [`fail_with`], [`Failure`]
//! and [`Outcome`] are for callers building their own command functions.

use std::fmt;

/// A failure carrying an error and, optionally, a typed payload describing
/// what was produced before the failure was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure<E, F = ()> {
    /// Why the operation failed.
    pub error: E,

    /// Optional data accompanying the failure.
    pub payload: Option<F>,
}

impl<E, F> Failure<E, F> {
    /// Creates a failure without a payload.
    pub fn new(error: E) -> Self {
        Self {
            error,
            payload: None,
        }
    }

    /// Creates a failure with a payload.
    pub fn with_payload(error: E, payload: F) -> Self {
        Self {
            error,
            payload: Some(payload),
        }
    }
}

impl<E, F> From<E> for Failure<E, F> {
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl<E: fmt::Display, F> fmt::Display for Failure<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<E, F> std::error::Error for Failure<E, F>
where
    E: std::error::Error + 'static,
    F: fmt::Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Constructs a success arm.
pub fn ok<T, E>(value: T) -> Result<T, E> {
    Ok(value)
}

/// Constructs a failure arm.
pub fn fail<T, E>(error: E) -> Result<T, E> {
    Err(error)
}

/// Constructs a failure arm carrying a typed payload.
pub fn fail_with<T, E, F>(error: E, payload: F) -> Result<T, Failure<E, F>> {
    Err(Failure::with_payload(error, payload))
}

/// Flag-style view of an outcome.
///
/// Exactly one of [`is_success`](Outcome::is_success) and
/// [`is_failure`](Outcome::is_failure) holds, and only the matching
/// accessor returns `Some`.
pub trait Outcome<T, E> {
    /// Returns true for the success arm.
    fn is_success(&self) -> bool;

    /// Returns true for the failure arm.
    fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns the success value, if any.
    fn value(&self) -> Option<&T>;

    /// Returns the failure error, if any.
    fn error(&self) -> Option<&E>;
}

impl<T, E> Outcome<T, E> for Result<T, E> {
    fn is_success(&self) -> bool {
        self.is_ok()
    }

    fn value(&self) -> Option<&T> {
        self.as_ref().ok()
    }

    fn error(&self) -> Option<&E> {
        self.as_ref().err()
    }
}
