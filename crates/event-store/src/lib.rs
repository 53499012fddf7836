pub mod error;
pub mod event;
pub mod memory;
pub mod source;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{DomainEvent, Event, EventNumber};
pub use memory::InMemoryEventSource;
pub use source::{EventSource, EventSourceExt, validate_events_for_append};
