//! Message record: body + delivery metadata.

use tokio::time::Instant;

use super::MessageState;
use crate::domain::ids::{MessageId, ReceiptHandle};

/// Single source of truth for a message. The ready list and in-flight heap
/// hold ids only; every state transition happens here.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub body: String,
    pub state: MessageState,

    /// Number of deliveries so far (including the current one if InFlight).
    pub receive_count: u32,

    /// Receipt of the current delivery; only it may ack.
    pub receipt: Option<ReceiptHandle>,

    /// Every receipt handed out for this message, current one included.
    pub issued: Vec<ReceiptHandle>,

    /// When an in-flight message becomes visible again.
    pub visible_at: Option<Instant>,

    pub sent_at: Instant,
    pub updated_at: Instant,
}

impl MessageRecord {
    pub fn new(message_id: MessageId, body: String) -> Self {
        let now = Instant::now();
        Self {
            message_id,
            body,
            state: MessageState::Visible,
            receive_count: 0,
            receipt: None,
            issued: Vec::new(),
            visible_at: None,
            sent_at: now,
            updated_at: now,
        }
    }

    /// Hand out a new delivery.
    pub fn start_delivery(&mut self, receipt: ReceiptHandle, visible_at: Instant) {
        self.state = MessageState::InFlight;
        self.receive_count += 1;
        self.receipt = Some(receipt);
        self.issued.push(receipt);
        self.visible_at = Some(visible_at);
        self.updated_at = Instant::now();
    }

    /// Visibility lapsed without an ack.
    pub fn make_visible(&mut self) {
        self.state = MessageState::Visible;
        self.receipt = None;
        self.visible_at = None;
        self.updated_at = Instant::now();
    }

    /// Dead records keep their body but hand back their receipts so the
    /// queue can forget them.
    pub fn mark_dead(&mut self) -> Vec<ReceiptHandle> {
        self.state = MessageState::Dead;
        self.receipt = None;
        self.visible_at = None;
        self.updated_at = Instant::now();
        std::mem::take(&mut self.issued)
    }
}
