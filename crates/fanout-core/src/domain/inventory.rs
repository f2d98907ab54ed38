//! Per-product stock register.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reorder level applied when a product was stocked without one.
pub const DEFAULT_REORDER_LEVEL: u32 = 10;

/// Stock of one product.
///
/// `available_stock` is unsigned; it only moves down through the store's
/// conditional decrement, which refuses to go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub product_id: String,
    pub available_stock: u32,
    #[serde(default = "default_reorder_level")]
    pub reorder_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_reorder_level() -> u32 {
    DEFAULT_REORDER_LEVEL
}

impl InventoryRecord {
    pub fn new(product_id: impl Into<String>, available_stock: u32) -> Self {
        Self {
            product_id: product_id.into(),
            available_stock,
            reorder_level: DEFAULT_REORDER_LEVEL,
            last_updated: None,
        }
    }

    pub fn with_reorder_level(mut self, reorder_level: u32) -> Self {
        self.reorder_level = reorder_level;
        self
    }

    /// A stored level of zero counts as unset and falls back to the default.
    pub fn effective_reorder_level(&self) -> u32 {
        if self.reorder_level == 0 {
            DEFAULT_REORDER_LEVEL
        } else {
            self.reorder_level
        }
    }

    pub fn is_low(&self) -> bool {
        self.available_stock <= self.effective_reorder_level()
    }
}

/// Result of one committed decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: String,
    pub decremented_by: u32,
    pub remaining: u32,
    /// Remaining stock is at or below the reorder level.
    pub low_stock: bool,
}

impl StockChange {
    pub fn from_record(record: &InventoryRecord, decremented_by: u32) -> Self {
        Self {
            product_id: record.product_id.clone(),
            decremented_by,
            remaining: record.available_stock,
            low_stock: record.is_low(),
        }
    }
}
