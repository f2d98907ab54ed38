//! Decrement strategies for the items of one inventory message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::inventory::StockChange;
use crate::ports::{DecrementReport, DecrementStrategy, InventoryStore, StockRequest};

/// One conditional decrement per item, in order. Stops at the first
/// rejection; items before it stay decremented.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemByItem;

#[async_trait]
impl DecrementStrategy for ItemByItem {
    async fn apply(
        &self,
        store: &dyn InventoryStore,
        requests: &[StockRequest],
        at: DateTime<Utc>,
    ) -> DecrementReport {
        let mut report = DecrementReport::default();
        for request in requests {
            match store
                .decrement_if_available(&request.product_id, request.quantity, at)
                .await
            {
                Ok(record) => report
                    .applied
                    .push(StockChange::from_record(&record, request.quantity)),
                Err(err) => {
                    report.rejected = Some(err);
                    break;
                }
            }
        }
        report
    }
}

/// Every item of the message in a single store transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOrNothing;

#[async_trait]
impl DecrementStrategy for AllOrNothing {
    async fn apply(
        &self,
        store: &dyn InventoryStore,
        requests: &[StockRequest],
        at: DateTime<Utc>,
    ) -> DecrementReport {
        match store.decrement_all_if_available(requests, at).await {
            Ok(records) => DecrementReport {
                applied: records
                    .iter()
                    .zip(requests)
                    .map(|(record, request)| StockChange::from_record(record, request.quantity))
                    .collect(),
                rejected: None,
            },
            Err(err) => DecrementReport {
                applied: Vec::new(),
                rejected: Some(err),
            },
        }
    }
}
