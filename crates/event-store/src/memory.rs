use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, Event, EventNumber, EventStoreError, Result,
    source::{EventSource, validate_events_for_append},
};

/// In-memory event source.
///
/// Keeps each aggregate's accepted events in a separate stream. Cloning
/// shares the underlying streams.
pub struct InMemoryEventSource<P> {
    streams: Arc<RwLock<HashMap<AggregateId, Vec<Event<P>>>>>,
}

impl<P> InMemoryEventSource<P> {
    /// Creates a new empty in-memory event source.
    pub fn new() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the total number of events stored across all aggregates.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Clears all streams.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }
}

impl<P> Default for InMemoryEventSource<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for InMemoryEventSource<P> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
        }
    }
}

#[async_trait]
impl<P> EventSource<P> for InMemoryEventSource<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn append(&self, events: Vec<Event<P>>) -> Result<EventNumber> {
        validate_events_for_append(&events)?;

        let first = &events[0];
        let Some(aggregate_id) = first.aggregate_id().cloned() else {
            return Err(EventStoreError::Unstamped {
                event_type: first.event_type().to_string(),
            });
        };

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id.clone()).or_default();

        let current = EventNumber::from_len(stream.len());
        let expected = current.next();
        if first.event_number() != expected {
            return Err(EventStoreError::SequenceConflict {
                aggregate_id,
                expected,
                actual: first.event_number(),
            });
        }

        let appended = events.len();
        stream.extend(events);
        let last = EventNumber::from_len(stream.len());

        metrics::counter!("event_source_events_appended_total").increment(appended as u64);
        tracing::debug!(%aggregate_id, appended, last = %last, "events appended");

        Ok(last)
    }

    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<Event<P>>> {
        let streams = self.streams.read().await;
        let mut events = streams.get(aggregate_id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.event_number());
        Ok(events)
    }

    async fn last_event_number(&self, aggregate_id: &AggregateId) -> Result<Option<EventNumber>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(Event::event_number))
    }
}
