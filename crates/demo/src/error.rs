//! Demo error types.

use domain::{AggregateError, RegistryError};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that stop a demo run.
#[derive(Debug, Error)]
pub enum DemoError {
    /// A script step could not be parsed.
    #[error("Invalid step '{step}': {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Queue error: {0}")]
    Queue(#[from] dispatch::QueueError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Stored events could not be replayed.
    #[error("Replay failed: {0}")]
    Replay(#[from] AggregateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics recorder error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Tracing setup error: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T> = std::result::Result<T, DemoError>;
