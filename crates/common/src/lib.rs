//! Shared types for the event-sourcing kernel.
//!
//! - [`AggregateId`]: string identity of an aggregate
//! - [`outcome`]: success/failure helpers layered on [`std::result::Result`]
//! - [`AppError`]: human-readable validation error with optional detail

pub mod error;
pub mod outcome;
pub mod types;

pub use error::AppError;
pub use outcome::{Failure, Outcome, fail, fail_with, ok};
pub use types::AggregateId;
