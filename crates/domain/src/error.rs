//! Kernel error types.

use event_store::{EventNumber, EventStoreError};
use thiserror::Error;

/// Error raised by a reducer that cannot fold an event into a state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ReduceError {
    message: String,
}

impl ReduceError {
    /// Creates a reduce error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur when an aggregate accepts an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// The reducer refused the event; the aggregate is unchanged.
    #[error("Event {event_type} #{event_number} could not be reduced: {source}")]
    Reduction {
        event_type: String,
        event_number: EventNumber,
        #[source]
        source: ReduceError,
    },

    /// The event cannot be numbered into this aggregate's log.
    #[error("Event rejected: {0}")]
    Event(#[from] EventStoreError),
}

/// Errors surfaced by [`CommandDrivenAggregate::execute_command`].
///
/// Every failure path of a command ends here; none of them leaves the
/// aggregate partially updated.
///
/// [`CommandDrivenAggregate::execute_command`]: crate::CommandDrivenAggregate::execute_command
#[derive(Debug, Error)]
pub enum CommandError<E> {
    /// The command refused to run, typically a violated precondition.
    #[error("Command {command} rejected: {source}")]
    Rejected {
        command: String,
        #[source]
        source: E,
    },

    /// The command reported success without producing any event.
    #[error("Command {command} reported success without producing any events")]
    EmptyBatch { command: String },

    /// An event produced by the command could not be applied; the whole
    /// command was rolled back.
    #[error("Command {command} rolled back: {source}")]
    Apply {
        command: String,
        #[source]
        source: AggregateError,
    },

    /// The command or the reducer panicked; anything already applied was
    /// rolled back.
    #[error("Command {command} panicked: {message}")]
    Panicked { command: String, message: String },
}

impl<E> CommandError<E> {
    /// Returns the name of the command that failed.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Rejected { command, .. }
            | CommandError::EmptyBatch { command }
            | CommandError::Apply { command, .. }
            | CommandError::Panicked { command, .. } => command,
        }
    }
}
