//! Dispatch error types.

use domain::CommandError;
use thiserror::Error;

/// Errors raised by the command queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue already holds `capacity` invocations.
    #[error("Command queue is full (capacity {capacity})")]
    Full { capacity: usize },

    /// The queue was shut down and accepts no more invocations.
    #[error("Command queue is closed")]
    Closed,

    /// The command function panicked. The queue kept draining.
    #[error("Command {command_type} panicked")]
    Panicked { command_type: String },

    /// The worker stopped before the invocation completed.
    #[error("Command queue worker stopped before completion")]
    WorkerStopped,

    /// An earlier invocation panicked while holding the aggregate, which may
    /// now be inconsistent.
    #[error("Aggregate {aggregate_id} is poisoned by an earlier panic")]
    Poisoned { aggregate_id: String },
}

/// Errors surfaced when executing a command through an aggregate handle.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Command(#[from] CommandError<E>),
}

impl<E> DispatchError<E> {
    /// Returns the command error, if the command itself failed.
    pub fn as_command(&self) -> Option<&CommandError<E>> {
        match self {
            DispatchError::Command(error) => Some(error),
            DispatchError::Queue(_) => None,
        }
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
