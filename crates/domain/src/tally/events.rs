//! Tally events and reducer.

use event_store::{DomainEvent, Event};
use serde::{Deserialize, Serialize};

use crate::error::ReduceError;
use crate::reducer::{Reducer, from_fn};

use super::Tally;

pub const ADD: &str = "Add";
pub const CLOSE: &str = "Close";

/// Events that can occur on a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TallyEvent {
    /// An amount was added to the total.
    Added { amount: i64 },

    /// The tally was closed.
    Closed,
}

impl DomainEvent for TallyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TallyEvent::Added { .. } => ADD,
            TallyEvent::Closed => CLOSE,
        }
    }
}

/// Folds one tally event into a tally.
pub fn reduce(event: &Event<TallyEvent>, state: &Tally) -> Result<Tally, ReduceError> {
    match event.payload() {
        TallyEvent::Added { amount } => {
            if state.closed {
                return Err(ReduceError::new("Cannot add to a closed tally"));
            }
            let total = state.checked_total(*amount).ok_or_else(|| {
                ReduceError::new(format!("Adding {amount} to {} overflows", state.total))
            })?;
            let entries = state
                .entries
                .checked_add(1)
                .ok_or_else(|| ReduceError::new("Tally cannot hold more entries"))?;
            Ok(Tally {
                total,
                entries,
                closed: false,
            })
        }
        TallyEvent::Closed => {
            if state.closed {
                return Err(ReduceError::new("Tally is already closed"));
            }
            Ok(Tally {
                closed: true,
                ..*state
            })
        }
    }
}

/// Returns the tally reducer.
pub fn reducer() -> impl Reducer<TallyEvent, Tally> {
    from_fn(reduce)
}
