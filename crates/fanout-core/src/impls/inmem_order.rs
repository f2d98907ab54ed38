//! InMemoryOrderStore - orders keyed by `(customer_id, order_timestamp)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::order::OrderRecord;
use crate::ports::OrderStore;

/// BTreeMap keeps each customer's orders in timestamp order.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    records: Arc<Mutex<BTreeMap<(String, DateTime<Utc>), OrderRecord>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn put(&self, record: OrderRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(record.key(), record);
        Ok(())
    }

    async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<OrderRecord>, StoreError> {
        let map = self.records.lock().await;
        Ok(map
            .iter()
            .filter(|((customer, _), _)| customer == customer_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
