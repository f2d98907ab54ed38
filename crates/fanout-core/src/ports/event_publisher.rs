//! EventPublisher port - what producers see of the event bus.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::envelope::BusEvent;
use crate::domain::ids::EventId;

/// Outcome of delivering one event to one target queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDelivery {
    pub rule: String,
    pub target: String,
    pub attempts: u32,
    /// `None` when delivered, otherwise the last error.
    pub error: Option<String>,
}

impl TargetDelivery {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// What the bus did with an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: EventId,
    pub deliveries: Vec<TargetDelivery>,
}

impl PublishReport {
    pub fn delivered(&self) -> impl Iterator<Item = &TargetDelivery> {
        self.deliveries.iter().filter(|d| d.is_delivered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetDelivery> {
        self.deliveries.iter().filter(|d| !d.is_delivered())
    }

    /// No rule matched the event.
    pub fn is_unrouted(&self) -> bool {
        self.deliveries.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("event bus {0} is closed")]
    Closed(String),
}

/// Accepting an event means it was matched and handed to its targets;
/// target failures are reported, not raised.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn put_event(&self, event: BusEvent) -> Result<PublishReport, BusError>;
}
