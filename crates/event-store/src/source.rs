use async_trait::async_trait;

use crate::{AggregateId, Event, EventNumber, EventStoreError, Result};

/// A store of accepted events that aggregates can be rehydrated from.
///
/// The kernel does not persist events itself. Implementations hold the
/// events an aggregate committed and hand them back, ordered by event
/// number, so they can be replayed into a fresh or reset aggregate.
#[async_trait]
pub trait EventSource<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Appends accepted events for a single aggregate.
    ///
    /// Events are appended atomically: either all are stored or none are.
    /// The batch must continue the stored sequence without gaps.
    ///
    /// Returns the number of the last stored event.
    async fn append(&self, events: Vec<Event<P>>) -> Result<EventNumber>;

    /// Retrieves all events for an aggregate in ascending event number order.
    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<Event<P>>>;

    /// Returns the number of the last stored event for an aggregate.
    ///
    /// Returns None if no events are stored for it.
    async fn last_event_number(&self, aggregate_id: &AggregateId) -> Result<Option<EventNumber>>;
}

/// Extension trait providing convenience methods for event sources.
#[async_trait]
pub trait EventSourceExt<P>: EventSource<P>
where
    P: Send + Sync + 'static,
{
    /// Appends a single event.
    async fn append_event(&self, event: Event<P>) -> Result<EventNumber> {
        self.append(vec![event]).await
    }

    /// Checks if an aggregate has any stored events.
    async fn contains(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.last_event_number(aggregate_id).await?.is_some())
    }
}

impl<P, T> EventSourceExt<P> for T
where
    P: Send + Sync + 'static,
    T: EventSource<P> + ?Sized,
{
}

/// Validates a batch of events before appending.
///
/// The batch must be non-empty, every event must have been accepted by an
/// aggregate, all events must belong to the same aggregate, and their
/// numbers must be consecutive.
pub fn validate_events_for_append<P>(events: &[Event<P>]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    for event in events {
        if !event.is_stamped() {
            return Err(EventStoreError::Unstamped {
                event_type: event.event_type().to_string(),
            });
        }
    }

    for event in events.iter().skip(1) {
        if event.aggregate_id() != first.aggregate_id() {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
    }

    let mut expected = first.event_number();
    for event in events.iter().skip(1) {
        expected = expected.next();
        if event.event_number() != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event numbers must be sequential. Expected {}, got {}",
                expected,
                event.event_number()
            )));
        }
    }

    Ok(())
}
