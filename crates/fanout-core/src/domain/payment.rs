//! Payment records and the settlement event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CorrelationId, PaymentId, TransactionId};
use super::money::Money;

/// Settlement status, serialized as COMPLETED / FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Detail-type of the settlement event for this status.
    pub fn detail_type(self) -> &'static str {
        match self {
            PaymentStatus::Completed => "PaymentCompleted",
            PaymentStatus::Failed => "PaymentFailed",
        }
    }
}

/// Outcome stored on a payment record.
///
/// A transaction id exists only on completed payments and a failure reason
/// only on failed ones; the enum makes any other combination unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PaymentOutcome {
    Completed { transaction_id: TransactionId },
    Failed { failure_reason: String },
}

impl PaymentOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Completed { .. } => PaymentStatus::Completed,
            PaymentOutcome::Failed { .. } => PaymentStatus::Failed,
        }
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            PaymentOutcome::Completed { transaction_id } => Some(*transaction_id),
            PaymentOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            PaymentOutcome::Completed { .. } => None,
            PaymentOutcome::Failed { failure_reason } => Some(failure_reason),
        }
    }
}

/// One payment attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub customer_id: String,
    pub order_timestamp: DateTime<Utc>,
    pub amount: Money,
    #[serde(flatten)]
    pub outcome: PaymentOutcome,
    pub payment_method: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl PaymentRecord {
    pub fn status(&self) -> PaymentStatus {
        self.outcome.status()
    }
}

/// Published after a payment record is written. No subscriber exists yet:
/// the bus accepts it and drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    pub customer_id: String,
    pub order_date: DateTime<Utc>,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl From<&PaymentRecord> for SettlementEvent {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            customer_id: record.customer_id.clone(),
            order_date: record.order_timestamp,
            payment_id: record.payment_id,
            status: record.status(),
            amount: record.amount,
            correlation_id: record.correlation_id,
        }
    }
}
