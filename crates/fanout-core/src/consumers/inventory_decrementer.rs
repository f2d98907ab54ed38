//! InventoryDecrementer - takes the ordered quantities off product stock.
//!
//! Each message is handled on its own: one message running out of stock
//! never fails its siblings. How the items of a single message are applied
//! is up to the [`DecrementStrategy`]; with the default [`ItemByItem`]
//! earlier items stay decremented when a later one is rejected, and a
//! redelivery decrements them again.
//!
//! [`ItemByItem`]: crate::impls::ItemByItem

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{BatchHandler, BatchResponse, parse_envelope, settle_message};
use crate::domain::envelope::{CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE};
use crate::domain::errors::PipelineError;
use crate::domain::ids::CorrelationId;
use crate::domain::state::Leg;
use crate::ports::{Clock, DecrementStrategy, InventoryStore, ReceivedMessage, StockRequest};

/// The slice of the checkout event this consumer reads. Items are taken
/// loosely so one bad line does not sink the message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryDetail {
    #[serde(default)]
    correlation_id: Option<CorrelationId>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    items: Option<Vec<InventoryItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryItem {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    quantity: Option<Value>,
}

impl InventoryItem {
    fn to_request(&self) -> Option<StockRequest> {
        let product_id = self.product_id.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
        let quantity = self
            .quantity
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|q| u32::try_from(q).ok())
            .filter(|&q| q > 0)?;
        Some(StockRequest::new(product_id, quantity))
    }
}

pub struct InventoryDecrementer {
    store: Arc<dyn InventoryStore>,
    strategy: Arc<dyn DecrementStrategy>,
    clock: Arc<dyn Clock>,
}

impl InventoryDecrementer {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        strategy: Arc<dyn DecrementStrategy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            strategy,
            clock,
        }
    }

    async fn decrement(&self, message: &ReceivedMessage) -> Result<(), PipelineError> {
        let envelope = parse_envelope(&message.body, CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE)?;
        let detail: InventoryDetail = envelope.detail_as()?;
        let correlation_id = detail
            .correlation_id
            .map(|c| c.to_string())
            .unwrap_or_default();

        let items = detail
            .items
            .ok_or_else(|| PipelineError::InvalidMessage("detail has no items array".into()))?;

        let mut requests = Vec::with_capacity(items.len());
        for (line, item) in items.iter().enumerate() {
            match item.to_request() {
                Some(request) => requests.push(request),
                None => warn!(
                    message_id = %message.message_id,
                    correlation_id = %correlation_id,
                    line,
                    ?item,
                    "skipping item without product id or positive quantity"
                ),
            }
        }

        let report = self
            .strategy
            .apply(self.store.as_ref(), &requests, self.clock.now())
            .await;

        for change in &report.applied {
            info!(
                product_id = %change.product_id,
                decremented_by = change.decremented_by,
                remaining = change.remaining,
                correlation_id = %correlation_id,
                "stock decremented"
            );
            if change.low_stock {
                warn!(
                    product_id = %change.product_id,
                    remaining = change.remaining,
                    correlation_id = %correlation_id,
                    "low stock"
                );
            }
        }

        match report.rejected {
            None => {
                info!(
                    customer_id = detail.customer_id.as_deref().unwrap_or_default(),
                    correlation_id = %correlation_id,
                    items = report.applied.len(),
                    "inventory updated"
                );
                Ok(())
            }
            Some(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl BatchHandler for InventoryDecrementer {
    fn leg(&self) -> Leg {
        Leg::Inventory
    }

    async fn handle_batch(&self, messages: &[ReceivedMessage]) -> BatchResponse {
        let mut response = BatchResponse::default();
        for message in messages {
            let result = self.decrement(message).await;
            settle_message(self.leg(), message, result, &mut response);
        }
        response
    }
}
