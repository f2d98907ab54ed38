//! MessageQueue port - durable, at-least-once message queue.
//!
//! Semantics follow a visibility-timeout queue:
//! - `receive` hands out visible messages and hides them for the visibility
//!   timeout. Each delivery gets a new receipt handle.
//! - `ack` with the latest receipt deletes the message.
//! - A message that is not acked in time becomes visible again and is
//!   redelivered with an incremented receive count.
//!
//! Ordering is best effort; duplicates are possible.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::{MessageId, ReceiptHandle};

/// One delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt: ReceiptHandle,
    pub body: String,
    /// 1 on first delivery.
    pub receive_count: u32,
}

/// Message counts by state, for status views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub visible: usize,
    pub in_flight: usize,
    pub acked: usize,
    pub dead: usize,
}

impl QueueCounts {
    /// Messages still owed processing (visible or in flight).
    pub fn outstanding(&self) -> usize {
        self.visible + self.in_flight
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue {0} is closed")]
    Closed(String),

    #[error("unknown message: {0}")]
    UnknownMessage(String),

    /// The receipt belongs to an earlier delivery; the message has been
    /// handed out again since.
    #[error("stale receipt for {message_id}")]
    StaleReceipt { message_id: MessageId },

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, body: String) -> Result<MessageId, QueueError>;

    /// Receives up to `max_messages` visible messages, waiting up to `wait`
    /// for the first one. An empty vec means nothing became visible in time.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    async fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError>;

    async fn counts(&self) -> Result<QueueCounts, QueueError>;
}
