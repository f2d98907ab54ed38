//! OrderRecorder - writes one order snapshot per checkout message.
//!
//! The sort key is the processing time, not anything from the event, so a
//! redelivered message lands as a second order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{BatchHandler, BatchResponse, parse_envelope, settle_message};
use crate::domain::checkout::CheckoutDetail;
use crate::domain::envelope::{CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE};
use crate::domain::errors::PipelineError;
use crate::domain::order::OrderRecord;
use crate::domain::state::Leg;
use crate::ports::{Clock, OrderStore, ReceivedMessage};

pub struct OrderRecorder {
    store: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
}

impl OrderRecorder {
    pub fn new(store: Arc<dyn OrderStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn record(&self, message: &ReceivedMessage) -> Result<(), PipelineError> {
        let envelope = parse_envelope(&message.body, CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE)?;
        let detail: CheckoutDetail = envelope.detail_as()?;

        let record = OrderRecord::snapshot(&detail, self.clock.now());
        let (customer_id, order_timestamp) = record.key();
        self.store.put(record).await?;

        info!(
            customer_id = %customer_id,
            order_timestamp = %order_timestamp,
            correlation_id = ?detail.correlation_id,
            message_id = %message.message_id,
            "order recorded"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for OrderRecorder {
    fn leg(&self) -> Leg {
        Leg::Order
    }

    async fn handle_batch(&self, messages: &[ReceivedMessage]) -> BatchResponse {
        let mut response = BatchResponse::default();
        for message in messages {
            let result = self.record(message).await;
            settle_message(self.leg(), message, result, &mut response);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::test_support::{bare_body, checkout, clock, envelope, message, message_with};
    use crate::domain::errors::StoreError;
    use crate::domain::money::Money;
    use crate::domain::order::DEFAULT_PAYMENT_METHOD;
    use crate::impls::InMemoryOrderStore;
    use chrono::Duration;

    struct UnavailableStore;

    #[async_trait]
    impl OrderStore for UnavailableStore {
        async fn put(&self, _record: OrderRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("throttled".into()))
        }
        async fn orders_for_customer(&self, _: &str) -> Result<Vec<OrderRecord>, StoreError> {
            Ok(Vec::new())
        }
        async fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn records_snapshot_keyed_by_processing_time() {
        let store = InMemoryOrderStore::new();
        let clock = clock();
        clock.advance(Duration::seconds(3));
        let recorder = OrderRecorder::new(Arc::new(store.clone()), clock.clone());

        let event = checkout("alice", &[("p1", 2, 10.0)]);
        let response = recorder.handle_batch(&[message(&event)]).await;
        assert!(response.batch_item_failures.is_empty());

        let orders = store.orders_for_customer("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_timestamp, clock.now());
        assert_ne!(orders[0].order_timestamp, event.order_date);
        assert_eq!(orders[0].total_price, Money::from_cents(2000));
        assert_eq!(orders[0].payment_method, DEFAULT_PAYMENT_METHOD);
        assert_eq!(orders[0].correlation_id, Some(event.correlation_id));
    }

    #[tokio::test]
    async fn redelivery_creates_a_second_order() {
        let store = InMemoryOrderStore::new();
        let clock = clock();
        let recorder = OrderRecorder::new(Arc::new(store.clone()), clock.clone());
        let msg = message(&checkout("alice", &[("p1", 2, 10.0)]));

        recorder.handle_batch(std::slice::from_ref(&msg)).await;
        clock.advance(Duration::seconds(30));
        let redelivered = ReceivedMessage {
            receive_count: 2,
            ..msg
        };
        recorder.handle_batch(&[redelivered]).await;

        assert_eq!(store.orders_for_customer("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn store_failure_reports_the_message() {
        let recorder = OrderRecorder::new(Arc::new(UnavailableStore), clock());
        let msg = message(&checkout("alice", &[("p1", 1, 1.0)]));

        let response = recorder.handle_batch(std::slice::from_ref(&msg)).await;
        assert!(response.is_failed(msg.message_id));
    }

    #[tokio::test]
    async fn malformed_body_is_reported_not_panicked() {
        let store = InMemoryOrderStore::new();
        let recorder = OrderRecorder::new(Arc::new(store.clone()), clock());
        let bad = message_with("{}".into(), 1);

        let response = recorder.handle_batch(std::slice::from_ref(&bad)).await;
        assert!(response.is_failed(bad.message_id));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_bare_basket_shaped_detail() {
        let store = InMemoryOrderStore::new();
        let clock = clock();
        let recorder = OrderRecorder::new(Arc::new(store.clone()), clock.clone());
        let msg = message_with(envelope(&bare_body()), 1);

        let response = recorder.handle_batch(std::slice::from_ref(&msg)).await;
        assert!(response.batch_item_failures.is_empty());

        let orders = store.orders_for_customer("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_price, Money::from_cents(2000));
        assert_eq!(orders[0].items[0].unit_price, Money::from_cents(1000));
        assert_eq!(orders[0].correlation_id, None);
        assert_eq!(orders[0].order_timestamp, clock.now());
    }
}
