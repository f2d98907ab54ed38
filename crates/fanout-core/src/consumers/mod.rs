//! Consumers - the three batch handlers behind the checkout queues.
//!
//! A handler gets one batch of queue messages and reports which of them
//! failed. Everything not listed is acknowledged by the consumer group; a
//! listed message stays in flight and comes back after its visibility
//! timeout.

pub mod inventory_decrementer;
pub mod order_recorder;
pub mod payment_processor;

pub use self::inventory_decrementer::InventoryDecrementer;
pub use self::order_recorder::OrderRecorder;
pub use self::payment_processor::PaymentProcessor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::envelope::BusEvent;
use crate::domain::errors::PipelineError;
use crate::domain::ids::MessageId;
use crate::domain::state::{Leg, LegState};
use crate::ports::ReceivedMessage;

/// `{"itemIdentifier": "<message id>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: MessageId,
}

/// `{"batchItemFailures": [...]}`; an empty list acknowledges the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn fail(&mut self, message_id: MessageId) {
        self.batch_item_failures.push(BatchItemFailure {
            item_identifier: message_id,
        });
    }

    pub fn is_failed(&self, message_id: MessageId) -> bool {
        self.batch_item_failures
            .iter()
            .any(|f| f.item_identifier == message_id)
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.batch_item_failures.iter().map(|f| f.item_identifier)
    }
}

#[async_trait]
pub trait BatchHandler: Send + Sync {
    fn leg(&self) -> Leg;

    async fn handle_batch(&self, messages: &[ReceivedMessage]) -> BatchResponse;
}

/// Parses a queue body and checks that it carries the expected event type.
pub(crate) fn parse_envelope(
    body: &str,
    source: &str,
    detail_type: &str,
) -> Result<BusEvent, PipelineError> {
    let event = BusEvent::from_body(body)?;
    if event.source != source || event.detail_type != detail_type {
        return Err(PipelineError::UnsupportedEventType {
            source_name: event.source,
            detail_type: event.detail_type,
        });
    }
    Ok(event)
}

/// Logs the per-message result and marks failures in the response.
///
/// Returns the leg's state after this attempt.
pub(crate) fn settle_message(
    leg: Leg,
    message: &ReceivedMessage,
    result: Result<(), PipelineError>,
    response: &mut BatchResponse,
) -> LegState {
    let after = LegState::Pending.after_attempt(result.is_ok());

    match result {
        Ok(()) => debug!(
            leg = %leg,
            message_id = %message.message_id,
            receive_count = message.receive_count,
            state = ?after,
            "message processed"
        ),
        Err(err) => {
            warn!(
                leg = %leg,
                message_id = %message.message_id,
                receive_count = message.receive_count,
                kind = ?err.kind(),
                retryable = err.kind().is_retryable(),
                state = ?after,
                error = %err,
                "message failed"
            );
            response.fail(message.message_id);
        }
    }
    after
}
