//! InMemoryPaymentStore - payments keyed by payment id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::ids::PaymentId;
use crate::domain::payment::PaymentRecord;
use crate::ports::PaymentStore;

#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    records: Arc<Mutex<HashMap<PaymentId, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: PaymentRecord) -> Result<(), StoreError> {
        let mut map = self.records.lock().await;
        if map.contains_key(&record.payment_id) {
            return Err(StoreError::DuplicateKey(record.payment_id.to_string()));
        }
        map.insert(record.payment_id, record);
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.records.lock().await.get(&payment_id).cloned())
    }

    /// Ordered by processing time. Payment ids only break ties, their
    /// random low bits say nothing about order within a millisecond.
    async fn list(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        let map = self.records.lock().await;
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by_key(|p| (p.processed_at, p.payment_id));
        Ok(all)
    }
}
