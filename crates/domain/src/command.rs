//! Command contract.

use event_store::{Event, EventNumber};
use serde::Serialize;

/// A named, parameterized unit of intent.
///
/// Executing a command checks its preconditions and either produces one or
/// more events or fails. A command is built fresh for every invocation and
/// is consumed by [`execute`](Command::execute), so it cannot be run twice.
pub trait Command {
    /// Payload of the events this command produces.
    type Payload;

    /// Parameters reported alongside failures.
    type Params: Serialize;

    /// Error returned when the command refuses to run.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the command name.
    fn name(&self) -> &str;

    /// Returns the command parameters.
    fn params(&self) -> &Self::Params;

    /// Runs the command, producing the event(s) to apply.
    fn execute(self) -> Result<Produced<Self::Payload>, Self::Error>;
}

/// Events produced by a successful command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Produced<P> {
    /// Exactly one event.
    Single(Event<P>),

    /// A batch applied all-or-nothing. A batch must not be empty.
    Batch(Vec<Event<P>>),
}

impl<P> Produced<P> {
    /// Returns the number of events produced.
    pub fn len(&self) -> usize {
        match self {
            Produced::Single(_) => 1,
            Produced::Batch(events) => events.len(),
        }
    }

    /// Returns true for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens into the list of events in application order.
    pub fn into_events(self) -> Vec<Event<P>> {
        match self {
            Produced::Single(event) => vec![event],
            Produced::Batch(events) => events,
        }
    }
}

impl<P> From<Event<P>> for Produced<P> {
    fn from(event: Event<P>) -> Self {
        Produced::Single(event)
    }
}

impl<P> From<Vec<Event<P>>> for Produced<P> {
    fn from(events: Vec<Event<P>>) -> Self {
        Produced::Batch(events)
    }
}

/// Result of a committed command.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<P, S> {
    /// The events the command appended, stamped with identity and number.
    pub events: Vec<Event<P>>,

    /// The aggregate state after the command.
    pub state: S,

    /// The number of the last event in the aggregate's log.
    pub version: EventNumber,
}
