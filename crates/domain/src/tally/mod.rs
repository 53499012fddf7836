//! Reference domain: a closable running total.
//!
//! Shows the kernel end to end. Commands check their preconditions and
//! produce [`TallyEvent`]s; the reducer refuses additions to a closed tally
//! and totals that would overflow.

mod commands;
mod events;
mod state;

pub use commands::{
    AddAll, AddAmount, CloseTally, TallyCommand, command_registry, event_registry,
};
pub use events::{ADD, CLOSE, TallyEvent, reduce, reducer};
pub use state::Tally;

use common::AggregateId;

use crate::CommandDrivenAggregate;

pub type TallyAggregate = CommandDrivenAggregate<TallyEvent, Tally>;

/// Creates an empty, open tally.
pub fn new_tally(id: impl Into<AggregateId>) -> TallyAggregate {
    CommandDrivenAggregate::new(id, Tally::default(), reducer())
}
