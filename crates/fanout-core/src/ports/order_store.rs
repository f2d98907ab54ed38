//! OrderStore port, keyed by `(customer_id, order_timestamp)`.

use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::order::OrderRecord;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Key-value put: a record with the same key is replaced.
    async fn put(&self, record: OrderRecord) -> Result<(), StoreError>;

    /// Orders of one customer, oldest first.
    async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<OrderRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<OrderRecord>, StoreError>;
}
