//! InMemoryInventoryStore - product stock held in a map.
//!
//! The conditional decrement runs entirely under the map lock, so two
//! consumers racing on the same product can never both pass the check.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::inventory::InventoryRecord;
use crate::ports::{InventoryStore, StockRequest};

#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    records: Arc<Mutex<HashMap<String, InventoryRecord>>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with the given records.
    pub async fn seed(&self, records: impl IntoIterator<Item = InventoryRecord>) {
        let mut map = self.records.lock().await;
        for record in records {
            map.insert(record.product_id.clone(), record);
        }
    }

    pub async fn list(&self) -> Vec<InventoryRecord> {
        let map = self.records.lock().await;
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        all
    }
}

/// Checks the precondition without writing.
fn check(
    map: &HashMap<String, InventoryRecord>,
    product_id: &str,
    quantity: u32,
) -> Result<(), StoreError> {
    let available = map.get(product_id).map_or(0, |r| r.available_stock);
    if available >= quantity {
        Ok(())
    } else {
        Err(StoreError::ConditionFailed {
            product_id: product_id.to_string(),
            available,
            requested: quantity,
        })
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get(&self, product_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.records.lock().await.get(product_id).cloned())
    }

    async fn put(&self, record: InventoryRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(record.product_id.clone(), record);
        Ok(())
    }

    async fn decrement_if_available(
        &self,
        product_id: &str,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<InventoryRecord, StoreError> {
        let mut map = self.records.lock().await;
        check(&map, product_id, quantity)?;
        let Some(record) = map.get_mut(product_id) else {
            // check() only passes for an unknown product when quantity is 0
            return Err(StoreError::ConditionFailed {
                product_id: product_id.to_string(),
                available: 0,
                requested: quantity,
            });
        };
        record.available_stock -= quantity;
        record.last_updated = Some(at);
        Ok(record.clone())
    }

    async fn decrement_all_if_available(
        &self,
        requests: &[StockRequest],
        at: DateTime<Utc>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut map = self.records.lock().await;

        // Sum per product first: two lines for the same product must fit together.
        let mut wanted: HashMap<&str, u32> = HashMap::new();
        for request in requests {
            let total = wanted.entry(request.product_id.as_str()).or_default();
            *total = total.saturating_add(request.quantity);
        }
        for request in requests {
            let total = wanted
                .get(request.product_id.as_str())
                .copied()
                .unwrap_or(request.quantity);
            check(&map, &request.product_id, total)?;
        }

        let mut updated = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(record) = map.get_mut(&request.product_id) {
                record.available_stock -= request.quantity;
                record.last_updated = Some(at);
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(stock: &[(&str, u32)]) -> InMemoryInventoryStore {
        let store = InMemoryInventoryStore::new();
        store
            .seed(stock.iter().map(|(id, n)| InventoryRecord::new(*id, *n)))
            .await;
        store
    }

    #[tokio::test]
    async fn decrements_when_stock_suffices() {
        let store = store_with(&[("p1", 5)]).await;
        let at = Utc::now();

        let rec = store.decrement_if_available("p1", 2, at).await.unwrap();
        assert_eq!(rec.available_stock, 3);
        assert_eq!(rec.last_updated, Some(at));
    }

    #[tokio::test]
    async fn failed_precondition_leaves_stock_untouched() {
        let store = store_with(&[("p1", 1)]).await;

        let err = store
            .decrement_if_available("p1", 2, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ConditionFailed {
                product_id: "p1".into(),
                available: 1,
                requested: 2
            }
        );
        assert_eq!(store.get("p1").await.unwrap().unwrap().available_stock, 1);
    }

    #[tokio::test]
    async fn unknown_product_counts_as_zero_stock() {
        let store = InMemoryInventoryStore::new();
        let err = store
            .decrement_if_available("ghost", 1, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed { available: 0, .. }));
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() {
        let store = store_with(&[("p1", 10)]).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.decrement_if_available("p1", 1, Utc::now()).await.is_ok()
            }));
        }
        let mut succeeded = 0;
        for h in handles {
            if h.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(store.get("p1").await.unwrap().unwrap().available_stock, 0);
    }

    #[tokio::test]
    async fn all_or_nothing_writes_nothing_on_failure() {
        let store = store_with(&[("p1", 5), ("p2", 1)]).await;
        let requests = [StockRequest::new("p1", 2), StockRequest::new("p2", 3)];

        let err = store
            .decrement_all_if_available(&requests, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed { ref product_id, .. } if product_id == "p2"));
        assert_eq!(store.get("p1").await.unwrap().unwrap().available_stock, 5);
    }

    #[tokio::test]
    async fn all_or_nothing_sums_repeated_products() {
        let store = store_with(&[("p1", 3)]).await;
        let requests = [StockRequest::new("p1", 2), StockRequest::new("p1", 2)];

        assert!(store
            .decrement_all_if_available(&requests, Utc::now())
            .await
            .is_err());
        assert_eq!(store.get("p1").await.unwrap().unwrap().available_stock, 3);
    }
}
