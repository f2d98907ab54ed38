//! PaymentStore port, keyed by payment id.

use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::ids::PaymentId;
use crate::domain::payment::PaymentRecord;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new record; an existing id is a [`StoreError::DuplicateKey`].
    async fn insert(&self, record: PaymentRecord) -> Result<(), StoreError>;

    async fn get(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>, StoreError>;

    /// Full scan.
    async fn list(&self) -> Result<Vec<PaymentRecord>, StoreError>;

    /// Full scan filtered by customer.
    async fn payments_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|p| p.customer_id == customer_id)
            .collect())
    }
}
