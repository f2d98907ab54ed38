//! InMemoryEventBus - rule-based router in front of the target queues.
//!
//! Each matching rule sends one copy of the event to each of its targets.
//! Targets are tried one after another, each with its own backoff retry; a
//! target that keeps refusing is reported in the [`PublishReport`] and the
//! remaining targets are still tried. Nothing is rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::envelope::{BusEvent, EventPattern};
use crate::ports::{BusError, EventPublisher, MessageQueue, PublishReport, TargetDelivery};
use crate::queue::RetryPolicy;

/// A named routing rule.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub pattern: EventPattern,
    pub targets: Vec<Arc<dyn MessageQueue>>,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: EventPattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            targets: Vec::new(),
        }
    }

    pub fn target(mut self, queue: Arc<dyn MessageQueue>) -> Self {
        self.targets.push(queue);
        self
    }
}

#[derive(Clone)]
pub struct InMemoryEventBus {
    name: String,
    rules: Vec<Rule>,
    retry: RetryPolicy,
}

impl InMemoryEventBus {
    pub fn new(name: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            retry,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    async fn deliver(&self, rule: &Rule, target: &dyn MessageQueue, body: &str) -> TargetDelivery {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match target.send(body.to_string()).await {
                Ok(_) => {
                    return TargetDelivery {
                        rule: rule.name.clone(),
                        target: target.name().to_string(),
                        attempts,
                        error: None,
                    };
                }
                Err(err) if attempts >= self.retry.max_attempts => {
                    return TargetDelivery {
                        rule: rule.name.clone(),
                        target: target.name().to_string(),
                        attempts,
                        error: Some(err.to_string()),
                    };
                }
                Err(err) => {
                    let delay = self.retry.next_delay(attempts);
                    debug!(
                        bus = %self.name,
                        target = target.name(),
                        attempts,
                        ?delay,
                        error = %err,
                        "target refused event, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn put_event(&self, event: BusEvent) -> Result<PublishReport, BusError> {
        let body = event.to_body()?;
        let mut deliveries = Vec::new();

        for rule in &self.rules {
            if !rule.pattern.matches(&event.source, &event.detail_type) {
                continue;
            }
            for target in &rule.targets {
                let delivery = self.deliver(rule, target.as_ref(), &body).await;
                if let Some(error) = &delivery.error {
                    warn!(
                        bus = %self.name,
                        rule = %rule.name,
                        target = %delivery.target,
                        event_id = %event.id,
                        attempts = delivery.attempts,
                        error = %error,
                        "event not delivered to target"
                    );
                }
                deliveries.push(delivery);
            }
        }

        if deliveries.is_empty() {
            debug!(
                bus = %self.name,
                event_id = %event.id,
                source = %event.source,
                detail_type = %event.detail_type,
                "no rule matched, event dropped"
            );
        }

        Ok(PublishReport {
            event_id: event.id,
            deliveries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::{CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE, PAYMENT_SOURCE};
    use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
    use crate::queue::{InMemoryQueue, RedrivePolicy};
    use chrono::Utc;
    use std::time::Duration;

    fn ids() -> Arc<dyn IdGenerator> {
        Arc::new(UlidGenerator::new(SystemClock))
    }

    fn queue(name: &str) -> InMemoryQueue {
        InMemoryQueue::new(name, Duration::from_secs(30), RedrivePolicy::unlimited(), ids())
    }

    fn event(source: &str, detail_type: &str) -> BusEvent {
        BusEvent::new(
            ids().event_id(),
            source,
            detail_type,
            Utc::now(),
            &serde_json::json!({"customerId": "alice"}),
        )
        .unwrap()
    }

    fn bus(targets: &[&InMemoryQueue]) -> InMemoryEventBus {
        let rule = targets.iter().fold(
            Rule::new("checkout", EventPattern::checkout()),
            |rule, q| rule.target(Arc::new((*q).clone())),
        );
        InMemoryEventBus::new("swn", RetryPolicy::new(3, Duration::from_millis(10), 2.0))
            .with_rule(rule)
    }

    #[tokio::test]
    async fn fans_out_one_copy_per_target() {
        let (a, b, c) = (queue("order"), queue("inventory"), queue("payment"));
        let report = bus(&[&a, &b, &c])
            .put_event(event(CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE))
            .await
            .unwrap();

        assert_eq!(report.delivered().count(), 3);
        for q in [&a, &b, &c] {
            let batch = q.receive(10, Duration::ZERO).await.unwrap();
            assert_eq!(batch.len(), 1);
            let body = BusEvent::from_body(&batch[0].body).unwrap();
            assert_eq!(body.id, report.event_id);
        }
    }

    #[tokio::test]
    async fn unmatched_event_is_dropped() {
        let a = queue("order");
        let report = bus(&[&a])
            .put_event(event(PAYMENT_SOURCE, "PaymentCompleted"))
            .await
            .unwrap();

        assert!(report.is_unrouted());
        assert_eq!(a.counts().await.unwrap().visible, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_target_does_not_block_siblings() {
        let (a, b, c) = (queue("order"), queue("inventory"), queue("payment"));
        b.close();

        let report = bus(&[&a, &b, &c])
            .put_event(event(CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE))
            .await
            .unwrap();

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].target, "inventory");
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(a.counts().await.unwrap().visible, 1);
        assert_eq!(c.counts().await.unwrap().visible, 1);
    }
}
