//! Tally state.

use serde::{Deserialize, Serialize};

/// A running total that can be closed to further additions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Sum of every accepted amount.
    pub total: i64,

    /// Number of accepted amounts.
    pub entries: u32,

    /// Once closed, no amount is accepted.
    pub closed: bool,
}

impl Tally {
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Returns the total after adding `amount`, or `None` on overflow.
    pub fn checked_total(&self, amount: i64) -> Option<i64> {
        self.total.checked_add(amount)
    }
}
