use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, EventStoreError, Result};

/// Trait for domain event payloads that know their own type tag.
///
/// Events should be named in past tense; the tag is what readers of the
/// log filter and dispatch on.
pub trait DomainEvent {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;
}

/// Position of an event within its aggregate's log.
///
/// `0` means "not yet accepted"; accepted events are numbered from 1 and
/// increase by 1 for each subsequent event on the same aggregate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventNumber(u64);

impl EventNumber {
    /// Creates an event number from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the number carried by an event that no aggregate accepted yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the number of the first event of a log.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the number following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the number a log of `len` events ends at.
    pub fn from_len(len: usize) -> Self {
        Self(len as u64)
    }

    /// Returns the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<EventNumber> for u64 {
    fn from(number: EventNumber) -> Self {
        number.0
    }
}

/// An immutable record of something that happened to one aggregate.
///
/// The type tag, payload and timestamp are fixed at construction. The
/// aggregate identity and event number are assigned exactly once, when an
/// aggregate accepts the event into its log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    event_type: String,
    payload: P,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    event_number: EventNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aggregate_id: Option<AggregateId>,
}

impl<P> Event<P> {
    /// Creates an event with the given type tag and payload, timestamped now.
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
            event_number: EventNumber::initial(),
            aggregate_id: None,
        }
    }

    /// Creates an event carrying only a type tag; the payload is empty.
    pub fn tagged(event_type: impl Into<String>) -> Self
    where
        P: Default,
    {
        Self::new(event_type, P::default())
    }

    /// Overrides the timestamp. Intended for events rebuilt from storage.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the type tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Consumes the event, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Returns when the event was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the position in the owning aggregate's log (0 until accepted).
    pub fn event_number(&self) -> EventNumber {
        self.event_number
    }

    /// Returns the owning aggregate, if the event has been accepted.
    pub fn aggregate_id(&self) -> Option<&AggregateId> {
        self.aggregate_id.as_ref()
    }

    /// Returns true once an aggregate has accepted the event.
    pub fn is_stamped(&self) -> bool {
        self.aggregate_id.is_some()
    }

    /// Assigns the owning aggregate and the position in its log.
    ///
    /// Stamping is allowed once. Re-stamping with the identical identity and
    /// number succeeds, so stored events can be replayed into a reset
    /// aggregate; any other re-stamp is rejected.
    pub fn stamp(&mut self, aggregate_id: &AggregateId, event_number: EventNumber) -> Result<()> {
        if event_number == EventNumber::initial() {
            return Err(EventStoreError::InvalidEventNumber(event_number));
        }

        if let Some(existing) = &self.aggregate_id {
            if existing == aggregate_id && self.event_number == event_number {
                return Ok(());
            }
            return Err(EventStoreError::AlreadyStamped {
                event_type: self.event_type.clone(),
                aggregate_id: existing.clone(),
                event_number: self.event_number,
            });
        }

        self.aggregate_id = Some(aggregate_id.clone());
        self.event_number = event_number;
        Ok(())
    }
}

impl<P: DomainEvent> From<P> for Event<P> {
    fn from(payload: P) -> Self {
        Self::new(payload.event_type(), payload)
    }
}
