//! PaymentProcessor - settles each checkout and announces the result.
//!
//! The record is written before the settlement event is published. When the
//! publish fails the message is reported failed and its redelivery settles
//! again under a new payment id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{BatchHandler, BatchResponse, parse_envelope, settle_message};
use crate::domain::checkout::CheckoutDetail;
use crate::domain::envelope::{BusEvent, CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE, PAYMENT_SOURCE};
use crate::domain::errors::PipelineError;
use crate::domain::order::DEFAULT_PAYMENT_METHOD;
use crate::domain::payment::{PaymentOutcome, PaymentRecord, SettlementEvent};
use crate::domain::state::Leg;
use crate::ports::{
    Clock, EventPublisher, IdGenerator, PaymentStore, ReceivedMessage, SettlementDecision,
    SettlementPolicy,
};

pub struct PaymentProcessor {
    store: Arc<dyn PaymentStore>,
    publisher: Arc<dyn EventPublisher>,
    policy: Arc<dyn SettlementPolicy>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        publisher: Arc<dyn EventPublisher>,
        policy: Arc<dyn SettlementPolicy>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            policy,
            ids,
            clock,
        }
    }

    /// Every payment record, oldest first.
    pub async fn list_payments(&self) -> Result<Vec<PaymentRecord>, PipelineError> {
        Ok(self.store.list().await?)
    }

    pub async fn payments_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentRecord>, PipelineError> {
        Ok(self.store.payments_for_customer(customer_id).await?)
    }

    async fn process(&self, message: &ReceivedMessage) -> Result<(), PipelineError> {
        let envelope = parse_envelope(&message.body, CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE)?;
        let detail: CheckoutDetail = envelope.detail_as()?;
        let amount = detail.total();

        let outcome = match self.policy.settle(&detail.customer_id, amount) {
            SettlementDecision::Completed => PaymentOutcome::Completed {
                transaction_id: self.ids.transaction_id(),
            },
            SettlementDecision::Failed { reason } => PaymentOutcome::Failed {
                failure_reason: reason,
            },
        };

        let now = self.clock.now();
        let record = PaymentRecord {
            payment_id: self.ids.payment_id(),
            order_timestamp: detail.order_date.unwrap_or(now),
            customer_id: detail.customer_id,
            amount,
            outcome,
            payment_method: detail
                .payment_method
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            processed_at: now,
            correlation_id: detail.correlation_id,
        };
        let settlement = SettlementEvent::from(&record);

        self.store.insert(record).await?;
        info!(
            payment_id = %settlement.payment_id,
            customer_id = %settlement.customer_id,
            amount = %settlement.amount,
            status = ?settlement.status,
            correlation_id = ?settlement.correlation_id,
            "payment recorded"
        );

        let bus_event = BusEvent::new(
            self.ids.event_id(),
            PAYMENT_SOURCE,
            settlement.status.detail_type(),
            now,
            &settlement,
        )?;
        self.publisher
            .put_event(bus_event)
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for PaymentProcessor {
    fn leg(&self) -> Leg {
        Leg::Payment
    }

    async fn handle_batch(&self, messages: &[ReceivedMessage]) -> BatchResponse {
        let mut response = BatchResponse::default();
        for message in messages {
            let result = self.process(message).await;
            settle_message(self.leg(), message, result, &mut response);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::test_support::{at, bare_body, checkout, clock, envelope, message, message_with};
    use crate::domain::money::Money;
    use crate::domain::payment::PaymentStatus;
    use crate::impls::{DEFAULT_FAILURE_REASON, FixedSettlement, InMemoryPaymentStore, RandomSettlement};
    use crate::ports::{BusError, PublishReport, SystemClock, UlidGenerator};
    use std::sync::Mutex;

    /// Captures published events instead of routing them.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<BusEvent>>,
        refuse: bool,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn put_event(&self, event: BusEvent) -> Result<PublishReport, BusError> {
            if self.refuse {
                return Err(BusError::Closed("test-bus".into()));
            }
            let report = PublishReport {
                event_id: event.id,
                deliveries: Vec::new(),
            };
            self.events.lock().unwrap().push(event);
            Ok(report)
        }
    }

    fn processor(
        store: &InMemoryPaymentStore,
        publisher: Arc<RecordingPublisher>,
        policy: Arc<dyn SettlementPolicy>,
    ) -> PaymentProcessor {
        PaymentProcessor::new(
            Arc::new(store.clone()),
            publisher,
            policy,
            Arc::new(UlidGenerator::new(SystemClock)),
            clock(),
        )
    }

    #[tokio::test]
    async fn completed_payment_is_recorded_and_announced() {
        let store = InMemoryPaymentStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let p = processor(&store, publisher.clone(), Arc::new(FixedSettlement::completed()));
        let event = checkout("alice", &[("p1", 2, 10.0)]);

        let response = p.handle_batch(&[message(&event)]).await;
        assert!(response.batch_item_failures.is_empty());

        let payments = p.payments_for_customer("alice").await.unwrap();
        assert_eq!(payments.len(), 1);
        let payment = &payments[0];
        assert_eq!(payment.amount, Money::from_cents(2000));
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert!(payment.outcome.transaction_id().is_some());
        assert_eq!(payment.order_timestamp, event.order_date);
        assert_eq!(payment.correlation_id, Some(event.correlation_id));

        let published = publisher.events.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].source, PAYMENT_SOURCE);
        assert_eq!(published[0].detail_type, "PaymentCompleted");
        let settlement: SettlementEvent = published[0].detail_as().unwrap();
        assert_eq!(settlement.payment_id, payment.payment_id);
    }

    #[tokio::test]
    async fn failed_payment_carries_reason() {
        let store = InMemoryPaymentStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let p = processor(&store, publisher.clone(), Arc::new(RandomSettlement::seeded(9, 0.0)));

        p.handle_batch(&[message(&checkout("alice", &[("p1", 1, 5.0)]))])
            .await;

        let payment = &p.list_payments().await.unwrap()[0];
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.outcome.failure_reason(), Some(DEFAULT_FAILURE_REASON));
        assert_eq!(publisher.events.lock().unwrap()[0].detail_type, "PaymentFailed");
    }

    #[tokio::test]
    async fn publish_failure_fails_the_message_after_recording() {
        let store = InMemoryPaymentStore::new();
        let publisher = Arc::new(RecordingPublisher {
            refuse: true,
            ..Default::default()
        });
        let p = processor(&store, publisher, Arc::new(FixedSettlement::completed()));
        let msg = message(&checkout("alice", &[("p1", 1, 5.0)]));

        let response = p.handle_batch(std::slice::from_ref(&msg)).await;
        assert!(response.is_failed(msg.message_id));
        assert_eq!(p.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_are_per_message() {
        let store = InMemoryPaymentStore::new();
        let p = processor(
            &store,
            Arc::new(RecordingPublisher::default()),
            Arc::new(FixedSettlement::completed()),
        );
        let good = message(&checkout("alice", &[("p1", 1, 5.0)]));
        let bad = message_with("not json".into(), 1);

        let response = p.handle_batch(&[good.clone(), bad.clone()]).await;
        assert!(response.is_failed(bad.message_id));
        assert!(!response.is_failed(good.message_id));
        assert_eq!(p.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settles_bare_basket_shaped_detail() {
        let store = InMemoryPaymentStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let p = processor(&store, publisher.clone(), Arc::new(FixedSettlement::completed()));
        let msg = message_with(envelope(&bare_body()), 1);

        let response = p.handle_batch(std::slice::from_ref(&msg)).await;
        assert!(response.batch_item_failures.is_empty());

        let payments = p.payments_for_customer("alice").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, Money::from_cents(2000));
        assert_eq!(payments[0].order_timestamp, at());
        assert_eq!(payments[0].correlation_id, None);

        let settlement: SettlementEvent = publisher.events.lock().unwrap()[0].detail_as().unwrap();
        assert_eq!(settlement.amount, Money::from_cents(2000));
        assert_eq!(settlement.correlation_id, None);
    }

    #[tokio::test]
    async fn missing_total_settles_zero() {
        let store = InMemoryPaymentStore::new();
        let p = processor(
            &store,
            Arc::new(RecordingPublisher::default()),
            Arc::new(FixedSettlement::completed()),
        );
        let body = serde_json::json!({
            "customerId": "bob",
            "items": [{"productId": "p1", "quantity": 1, "price": 4}],
        });

        let response = p.handle_batch(&[message_with(envelope(&body), 1)]).await;
        assert!(response.batch_item_failures.is_empty());

        let payment = &p.payments_for_customer("bob").await.unwrap()[0];
        assert_eq!(payment.amount, Money::ZERO);
        assert_eq!(payment.processed_at, payment.order_timestamp);
    }
}
