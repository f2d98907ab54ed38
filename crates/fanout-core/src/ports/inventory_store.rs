//! InventoryStore port.
//!
//! Stock only moves down through [`InventoryStore::decrement_if_available`],
//! a single atomic compare-and-write at the store. Callers never read, do
//! arithmetic and write back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreError;
use crate::domain::inventory::InventoryRecord;

/// One requested decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequest {
    pub product_id: String,
    pub quantity: u32,
}

impl StockRequest {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get(&self, product_id: &str) -> Result<Option<InventoryRecord>, StoreError>;

    /// Unconditional write; used for seeding and restocking only.
    async fn put(&self, record: InventoryRecord) -> Result<(), StoreError>;

    /// `available_stock -= quantity` iff `available_stock >= quantity`.
    ///
    /// Returns the record after the write. A failed precondition returns
    /// [`StoreError::ConditionFailed`] and leaves the record untouched; an
    /// unknown product counts as zero stock.
    async fn decrement_if_available(
        &self,
        product_id: &str,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<InventoryRecord, StoreError>;

    /// Applies every decrement or none of them, as one store transaction.
    async fn decrement_all_if_available(
        &self,
        requests: &[StockRequest],
        at: DateTime<Utc>,
    ) -> Result<Vec<InventoryRecord>, StoreError>;
}
