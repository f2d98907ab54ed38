//! Settlement policies: a seeded coin flip and a fixed answer.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::money::Money;
use crate::ports::{SettlementDecision, SettlementPolicy};

pub const DEFAULT_SUCCESS_RATIO: f64 = 0.9;
pub const DEFAULT_FAILURE_REASON: &str = "Insufficient funds";

/// Completes a payment with probability `success_ratio`.
pub struct RandomSettlement {
    rng: Mutex<StdRng>,
    success_ratio: f64,
    failure_reason: String,
}

impl RandomSettlement {
    pub fn new(success_ratio: f64) -> Self {
        Self::with_rng(StdRng::from_entropy(), success_ratio)
    }

    /// Reproducible sequence of outcomes.
    pub fn seeded(seed: u64, success_ratio: f64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), success_ratio)
    }

    fn with_rng(rng: StdRng, success_ratio: f64) -> Self {
        Self {
            rng: Mutex::new(rng),
            success_ratio: success_ratio.clamp(0.0, 1.0),
            failure_reason: DEFAULT_FAILURE_REASON.to_string(),
        }
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = reason.into();
        self
    }
}

impl Default for RandomSettlement {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATIO)
    }
}

impl SettlementPolicy for RandomSettlement {
    fn settle(&self, _customer_id: &str, _amount: Money) -> SettlementDecision {
        let roll: f64 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0.0..1.0);
        if roll < self.success_ratio {
            SettlementDecision::Completed
        } else {
            SettlementDecision::Failed {
                reason: self.failure_reason.clone(),
            }
        }
    }
}

/// Always returns the same decision.
#[derive(Debug, Clone)]
pub struct FixedSettlement(pub SettlementDecision);

impl FixedSettlement {
    pub fn completed() -> Self {
        Self(SettlementDecision::Completed)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self(SettlementDecision::Failed {
            reason: reason.into(),
        })
    }
}

impl SettlementPolicy for FixedSettlement {
    fn settle(&self, _customer_id: &str, _amount: Money) -> SettlementDecision {
        self.0.clone()
    }
}
