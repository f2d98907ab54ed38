//! Per-checkout leg state.
//!
//! A checkout fans out into three legs (order, inventory, payment). Each leg
//! runs its own small machine; nothing aggregates the three, and a failed
//! leg never reverts a committed one.
//!
//! ```text
//! Pending -> Committed
//! Pending -> FailedRetryable -> Pending (redelivery)
//! ```
//!
//! Only the queue remembers anything between attempts: a message handed
//! out is a `Pending` leg, whatever its receive count, and the visibility
//! timeout is the `FailedRetryable -> Pending` edge.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Order,
    Inventory,
    Payment,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Leg::Order => "order",
            Leg::Inventory => "inventory",
            Leg::Payment => "payment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegState {
    Pending,
    Committed,
    FailedRetryable,
}

impl LegState {
    /// State after a processing attempt of this leg finished.
    pub fn after_attempt(self, succeeded: bool) -> LegState {
        match (self, succeeded) {
            (LegState::Committed, _) => LegState::Committed,
            (_, true) => LegState::Committed,
            (_, false) => LegState::FailedRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_outcome_decides_the_leg() {
        assert_eq!(LegState::Pending.after_attempt(true), LegState::Committed);
        assert_eq!(LegState::Pending.after_attempt(false), LegState::FailedRetryable);
    }

    #[test]
    fn committed_is_sticky() {
        assert_eq!(LegState::Committed.after_attempt(false), LegState::Committed);
    }
}
