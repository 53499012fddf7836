//! Event-folded aggregates.

use common::AggregateId;
use event_store::{Event, EventNumber};

use crate::error::{AggregateError, ReduceError};
use crate::reducer::Reducer;

/// An entity whose current state is the fold of its ordered event log.
///
/// The aggregate exclusively owns its log and state. After every public
/// operation, `state()` equals folding `events()` over `initial_state()`
/// with the injected reducer.
///
/// Two observable states:
/// - *fresh*: no events, current state is the initial state
/// - *populated*: at least one event accepted
pub struct Aggregate<P, S> {
    id: AggregateId,
    initial_state: S,
    current_state: S,
    events: Vec<Event<P>>,
    reducer: Box<dyn Reducer<P, S>>,
}

impl<P, S: Clone> Aggregate<P, S> {
    /// Creates a fresh aggregate.
    pub fn new(
        id: impl Into<AggregateId>,
        initial_state: S,
        reducer: impl Reducer<P, S> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            current_state: initial_state.clone(),
            initial_state,
            events: Vec::new(),
            reducer: Box::new(reducer),
        }
    }

    /// Returns the aggregate's identity.
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> &S {
        &self.current_state
    }

    /// Returns the state the aggregate was created with.
    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }

    /// Returns the accepted events in order.
    pub fn events(&self) -> &[Event<P>] {
        &self.events
    }

    /// Returns the number of the last accepted event (0 when fresh).
    pub fn version(&self) -> EventNumber {
        EventNumber::from_len(self.events.len())
    }

    /// Returns true while no event has been accepted.
    pub fn is_fresh(&self) -> bool {
        self.events.is_empty()
    }

    /// Accepts an event into the log and returns the new current state.
    ///
    /// The event is stamped with this aggregate's identity and the next
    /// event number, then reduced against the current state. The log and
    /// state only change once the reducer succeeds; on error the event is
    /// dropped and the aggregate is untouched.
    pub fn add_event(&mut self, mut event: Event<P>) -> Result<&S, AggregateError> {
        let event_number = self.version().next();
        event.stamp(&self.id, event_number)?;

        let next = self
            .reducer
            .reduce(&event, &self.current_state)
            .map_err(|source| AggregateError::Reduction {
                event_type: event.event_type().to_string(),
                event_number,
                source,
            })?;

        self.events.push(event);
        self.current_state = next;
        metrics::counter!("kernel_events_applied_total").increment(1);

        Ok(&self.current_state)
    }

    /// Folds one event into an arbitrary state without touching the
    /// aggregate.
    pub fn reduce(&self, state: &S, event: &Event<P>) -> Result<S, ReduceError> {
        self.reducer.reduce(event, state)
    }

    /// Recomputes the state by folding the whole log from the initial state.
    pub fn replayed_state(&self) -> Result<S, ReduceError> {
        self.events
            .iter()
            .try_fold(self.initial_state.clone(), |state, event| {
                self.reducer.reduce(event, &state)
            })
    }

    /// Discards the log and reverts to the initial state.
    pub fn reset(&mut self) {
        self.events.clear();
        self.current_state = self.initial_state.clone();
    }

    /// Rebuilds the aggregate from stored events.
    ///
    /// Resets the aggregate and accepts `events` in order. Events must be
    /// ordered by ascending event number and, if already stamped, belong to
    /// this aggregate at the position they are replayed into. If any event
    /// is refused, the aggregate is restored to what it was before the call.
    pub fn rehydrate(
        &mut self,
        events: impl IntoIterator<Item = Event<P>>,
    ) -> Result<&S, AggregateError> {
        let previous_events = std::mem::take(&mut self.events);
        let previous_state =
            std::mem::replace(&mut self.current_state, self.initial_state.clone());

        for event in events {
            if let Err(error) = self.add_event(event).map(|_| ()) {
                self.events = previous_events;
                self.current_state = previous_state;
                tracing::warn!(aggregate_id = %self.id, %error, "rehydration aborted");
                return Err(error);
            }
        }

        tracing::debug!(aggregate_id = %self.id, version = %self.version(), "aggregate rehydrated");
        Ok(&self.current_state)
    }

    /// Truncates the log to `len` events and restores `state`.
    ///
    /// `state` must be the state the aggregate had when its log was `len`
    /// events long.
    pub(crate) fn restore(&mut self, len: usize, state: S) {
        self.events.truncate(len);
        self.current_state = state;
    }
}

impl<P, S: std::fmt::Debug> std::fmt::Debug for Aggregate<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("id", &self.id)
            .field("version", &self.events.len())
            .field("current_state", &self.current_state)
            .finish_non_exhaustive()
    }
}
