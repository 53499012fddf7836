use thiserror::Error;

use crate::{AggregateId, EventNumber};

/// Errors that can occur when numbering, appending or replaying events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// The event was already accepted by an aggregate under a different
    /// identity or position.
    #[error(
        "Event {event_type} already belongs to aggregate {aggregate_id} as event #{event_number}"
    )]
    AlreadyStamped {
        event_type: String,
        aggregate_id: AggregateId,
        event_number: EventNumber,
    },

    /// Event numbers start at 1.
    #[error("Invalid event number {0}: event numbers start at 1")]
    InvalidEventNumber(EventNumber),

    /// The event has not been accepted by any aggregate yet.
    #[error("Event {event_type} has not been accepted by an aggregate")]
    Unstamped { event_type: String },

    /// The append does not continue the stored sequence.
    #[error(
        "Sequence conflict for aggregate {aggregate_id}: expected event #{expected}, found #{actual}"
    )]
    SequenceConflict {
        aggregate_id: AggregateId,
        expected: EventNumber,
        actual: EventNumber,
    },

    /// The batch handed to an append is malformed.
    #[error("Append validation error: {0}")]
    InvalidAppend(String),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
