//! SettlementPolicy port - decides the outcome of a payment attempt.
//!
//! Pure decision, no I/O: the processor records and publishes whatever the
//! policy returns.

use crate::domain::money::Money;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementDecision {
    Completed,
    Failed { reason: String },
}

impl SettlementDecision {
    pub fn is_completed(&self) -> bool {
        matches!(self, SettlementDecision::Completed)
    }
}

pub trait SettlementPolicy: Send + Sync {
    fn settle(&self, customer_id: &str, amount: Money) -> SettlementDecision;
}
