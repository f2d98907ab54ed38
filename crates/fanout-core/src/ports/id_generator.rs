//! IdGenerator port.
//!
//! Each id type gets its own method so callers cannot mix them up, while the
//! trait stays object-safe (`Arc<dyn IdGenerator>`).

use ulid::Ulid;

use crate::domain::ids::{
    CorrelationId, EventId, MessageId, PaymentId, ReceiptHandle, TransactionId,
};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    /// A fresh ULID; the typed methods wrap it.
    fn next_ulid(&self) -> Ulid;

    fn payment_id(&self) -> PaymentId {
        PaymentId::from_ulid(self.next_ulid())
    }

    fn transaction_id(&self) -> TransactionId {
        TransactionId::from_ulid(self.next_ulid())
    }

    fn message_id(&self) -> MessageId {
        MessageId::from_ulid(self.next_ulid())
    }

    fn receipt_handle(&self) -> ReceiptHandle {
        ReceiptHandle::from_ulid(self.next_ulid())
    }

    fn event_id(&self) -> EventId {
        EventId::from_ulid(self.next_ulid())
    }

    fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_ulid(self.next_ulid())
    }
}

/// ULID generator whose timestamp part comes from a [`Clock`].
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
