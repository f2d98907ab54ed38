//! DecrementStrategy port - how the items of one message hit the store.
//!
//! The inventory consumer only sees a [`DecrementReport`]; whether earlier
//! items survive a later rejection is the strategy's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreError;
use crate::domain::inventory::StockChange;
use crate::ports::inventory_store::{InventoryStore, StockRequest};

/// What a strategy committed for one message.
#[derive(Debug, Default)]
pub struct DecrementReport {
    /// Decrements that are durable, in request order.
    pub applied: Vec<StockChange>,
    /// Why the message could not be fully applied.
    pub rejected: Option<StoreError>,
}

impl DecrementReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_none()
    }
}

#[async_trait]
pub trait DecrementStrategy: Send + Sync {
    async fn apply(
        &self,
        store: &dyn InventoryStore,
        requests: &[StockRequest],
        at: DateTime<Utc>,
    ) -> DecrementReport;
}
