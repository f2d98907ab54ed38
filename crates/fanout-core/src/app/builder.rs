//! PipelineBuilder - wires stores, queues, the bus and the three consumers.
//!
//! Every collaborator has an in-memory default and can be swapped before
//! `build()`. Build checks the wiring up front (fail-fast) so a pipeline that
//! would silently lose a leg never starts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::publisher::{CheckoutPublisher, CheckoutReceipt};
use super::status::{PipelineStatus, QueueStatus};
use super::worker_loop::{BatchSummary, ConsumerGroup, ConsumerOptions, poll_once};
use crate::config::{DecrementMode, PipelineConfig};
use crate::consumers::{BatchHandler, InventoryDecrementer, OrderRecorder, PaymentProcessor};
use crate::domain::checkout::CheckoutRequest;
use crate::domain::envelope::EventPattern;
use crate::domain::errors::PipelineError;
use crate::domain::payment::PaymentRecord;
use crate::domain::state::Leg;
use crate::impls::{
    AllOrNothing, InMemoryEventBus, InMemoryInventoryStore, InMemoryOrderStore,
    InMemoryPaymentStore, ItemByItem, RandomSettlement, Rule,
};
use crate::ports::{
    Clock, DecrementStrategy, IdGenerator, InventoryStore, MessageQueue, OrderStore, PaymentStore,
    QueueError, SettlementPolicy, SystemClock, UlidGenerator,
};
use crate::queue::{InMemoryQueue, RedrivePolicy, RetryPolicy};

pub const EVENT_BUS: &str = "SwnEventBus";
pub const CHECKOUT_RULE: &str = "CheckoutBasketRule";
pub const ORDER_QUEUE: &str = "OrderQueue";
pub const INVENTORY_QUEUE: &str = "InventoryQueue";
pub const PAYMENT_QUEUE: &str = "PaymentQueue";

const ALL_LEGS: [Leg; 3] = [Leg::Order, Leg::Inventory, Leg::Payment];

fn queue_name(leg: Leg) -> &'static str {
    match leg {
        Leg::Order => ORDER_QUEUE,
        Leg::Inventory => INVENTORY_QUEUE,
        Leg::Payment => PAYMENT_QUEUE,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no consumer for {0:?}: these legs were expected but not wired")]
    MissingConsumers(Vec<Leg>),

    #[error("checkout rule has no targets")]
    NoTargets,

    #[error("handler wired for the {slot} queue handles the {handler} leg")]
    LegMismatch { slot: Leg, handler: Leg },
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    settlement: Option<Arc<dyn SettlementPolicy>>,
    decrement: Option<Arc<dyn DecrementStrategy>>,
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    handlers: HashMap<Leg, Arc<dyn BatchHandler>>,
    removed: HashSet<Leg>,
    expected: Vec<Leg>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            ids: None,
            settlement: None,
            decrement: None,
            inventory: Arc::new(InMemoryInventoryStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            handlers: HashMap::new(),
            removed: HashSet::new(),
            expected: ALL_LEGS.to_vec(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn settlement(mut self, policy: Arc<dyn SettlementPolicy>) -> Self {
        self.settlement = Some(policy);
        self
    }

    pub fn decrement_strategy(mut self, strategy: Arc<dyn DecrementStrategy>) -> Self {
        self.decrement = Some(strategy);
        self
    }

    pub fn inventory_store(mut self, store: Arc<dyn InventoryStore>) -> Self {
        self.inventory = store;
        self
    }

    pub fn order_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.orders = store;
        self
    }

    pub fn payment_store(mut self, store: Arc<dyn PaymentStore>) -> Self {
        self.payments = store;
        self
    }

    /// Replaces the default consumer of one queue.
    pub fn handler(mut self, leg: Leg, handler: Arc<dyn BatchHandler>) -> Self {
        self.handlers.insert(leg, handler);
        self
    }

    /// Drops a queue (and its consumer) from the checkout rule.
    pub fn without_leg(mut self, leg: Leg) -> Self {
        self.removed.insert(leg);
        self
    }

    /// Legs that must be wired for `build()` to succeed. All three by default.
    pub fn expect_legs(mut self, legs: &[Leg]) -> Self {
        self.expected = legs.to_vec();
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let legs: Vec<Leg> = ALL_LEGS
            .into_iter()
            .filter(|leg| !self.removed.contains(leg))
            .collect();

        let missing: Vec<Leg> = self
            .expected
            .iter()
            .filter(|leg| !legs.contains(*leg))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingConsumers(missing));
        }
        if legs.is_empty() {
            return Err(BuildError::NoTargets);
        }
        for (slot, handler) in &self.handlers {
            if handler.leg() != *slot {
                return Err(BuildError::LegMismatch {
                    slot: *slot,
                    handler: handler.leg(),
                });
            }
        }

        let config = self.config;
        let clock = self.clock;
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let redrive = RedrivePolicy {
            max_receive_count: config.max_receive_count,
        };

        let queues: Vec<(Leg, Arc<InMemoryQueue>)> = legs
            .iter()
            .map(|&leg| {
                let queue = InMemoryQueue::new(
                    queue_name(leg),
                    config.visibility_timeout,
                    redrive,
                    Arc::clone(&ids),
                );
                (leg, Arc::new(queue))
            })
            .collect();

        let rule = queues.iter().fold(
            Rule::new(CHECKOUT_RULE, EventPattern::checkout()),
            |rule, (_, queue)| rule.target(Arc::clone(queue) as Arc<dyn MessageQueue>),
        );
        let bus = Arc::new(
            InMemoryEventBus::new(
                EVENT_BUS,
                RetryPolicy::new(config.bus_max_attempts, config.bus_base_delay, 2.0),
            )
            .with_rule(rule),
        );

        let settlement: Arc<dyn SettlementPolicy> = match (self.settlement, config.settlement_seed) {
            (Some(policy), _) => policy,
            (None, Some(seed)) => Arc::new(RandomSettlement::seeded(seed, config.settlement_ratio)),
            (None, None) => Arc::new(RandomSettlement::new(config.settlement_ratio)),
        };
        let decrement: Arc<dyn DecrementStrategy> = match (self.decrement, config.decrement) {
            (Some(strategy), _) => strategy,
            (None, DecrementMode::ItemByItem) => Arc::new(ItemByItem),
            (None, DecrementMode::AllOrNothing) => Arc::new(AllOrNothing),
        };

        let mut handlers = self.handlers;
        let mut wired = Vec::with_capacity(queues.len());
        for (leg, queue) in queues {
            let handler: Arc<dyn BatchHandler> = match handlers.remove(&leg) {
                Some(custom) => custom,
                None => match leg {
                    Leg::Order => Arc::new(OrderRecorder::new(
                        Arc::clone(&self.orders),
                        Arc::clone(&clock),
                    )),
                    Leg::Inventory => Arc::new(InventoryDecrementer::new(
                        Arc::clone(&self.inventory),
                        Arc::clone(&decrement),
                        Arc::clone(&clock),
                    )),
                    Leg::Payment => Arc::new(PaymentProcessor::new(
                        Arc::clone(&self.payments),
                        bus.clone(),
                        Arc::clone(&settlement),
                        Arc::clone(&ids),
                        Arc::clone(&clock),
                    )),
                },
            };
            let batch_size = match leg {
                Leg::Order => config.order_batch_size,
                Leg::Inventory => config.inventory_batch_size,
                Leg::Payment => config.payment_batch_size,
            };
            let options = ConsumerOptions::new(batch_size)
                .with_workers(config.workers_per_queue)
                .with_poll_wait(config.poll_wait);
            wired.push(WiredLeg {
                leg,
                queue,
                handler,
                options,
            });
        }

        let publisher = CheckoutPublisher::new(bus.clone(), Arc::clone(&ids), clock);
        info!(
            bus = EVENT_BUS,
            rule = CHECKOUT_RULE,
            legs = ?legs,
            "pipeline built"
        );

        Ok(Pipeline {
            config,
            publisher,
            bus,
            legs: wired,
            inventory: self.inventory,
            orders: self.orders,
            payments: self.payments,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

struct WiredLeg {
    leg: Leg,
    queue: Arc<InMemoryQueue>,
    handler: Arc<dyn BatchHandler>,
    options: ConsumerOptions,
}

/// Totals of a [`Pipeline::drain`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub rounds: usize,
    pub received: usize,
    pub acked: usize,
    pub failed: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    publisher: CheckoutPublisher,
    bus: Arc<InMemoryEventBus>,
    legs: Vec<WiredLeg>,
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bus(&self) -> &InMemoryEventBus {
        &self.bus
    }

    pub fn inventory(&self) -> &Arc<dyn InventoryStore> {
        &self.inventory
    }

    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    pub fn payments(&self) -> &Arc<dyn PaymentStore> {
        &self.payments
    }

    pub fn queue(&self, leg: Leg) -> Option<&Arc<InMemoryQueue>> {
        self.legs.iter().find(|w| w.leg == leg).map(|w| &w.queue)
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, PipelineError> {
        self.publisher.checkout(request).await
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentRecord>, PipelineError> {
        Ok(self.payments.list().await?)
    }

    pub async fn payments_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentRecord>, PipelineError> {
        Ok(self.payments.payments_for_customer(customer_id).await?)
    }

    /// Spawns one consumer group per queue.
    pub fn start(&self) -> RunningPipeline {
        let groups = self
            .legs
            .iter()
            .map(|w| {
                ConsumerGroup::spawn(
                    Arc::clone(&w.queue) as Arc<dyn MessageQueue>,
                    Arc::clone(&w.handler),
                    w.options,
                )
            })
            .collect();
        RunningPipeline { groups }
    }

    /// Polls every queue in turn until a full round receives nothing, i.e.
    /// every queue is empty or holds only invisible messages. Meant for
    /// tests and the demo; do not mix with a started pipeline.
    pub async fn drain(&self) -> Result<DrainSummary, QueueError> {
        let mut summary = DrainSummary::default();
        loop {
            let mut round = BatchSummary::default();
            for w in &self.legs {
                let batch = poll_once(
                    w.queue.as_ref(),
                    w.handler.as_ref(),
                    w.options.batch_size,
                    Duration::ZERO,
                )
                .await?;
                round.received += batch.received;
                round.acked += batch.acked;
                round.failed += batch.failed;
            }
            if round.received == 0 {
                return Ok(summary);
            }
            summary.rounds += 1;
            summary.received += round.received;
            summary.acked += round.acked;
            summary.failed += round.failed;
        }
    }

    pub async fn status(&self) -> Result<PipelineStatus, QueueError> {
        let mut queues = Vec::with_capacity(self.legs.len());
        for w in &self.legs {
            queues.push(QueueStatus {
                queue: w.queue.name().to_string(),
                leg: w.leg,
                counts: w.queue.counts().await?,
            });
        }
        Ok(PipelineStatus { queues })
    }
}

/// Consumer groups of a started pipeline.
pub struct RunningPipeline {
    groups: Vec<ConsumerGroup>,
}

impl RunningPipeline {
    /// Stops taking new batches and waits for the ones in progress.
    pub async fn shutdown(self) {
        for group in &self.groups {
            group.request_shutdown();
        }
        for group in self.groups {
            group.shutdown_and_join().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::BatchResponse;
    use crate::domain::checkout::BasketLine;
    use crate::domain::inventory::InventoryRecord;
    use crate::domain::money::Money;
    use crate::domain::payment::PaymentStatus;
    use crate::impls::FixedSettlement;
    use crate::ports::ReceivedMessage;

    struct NoopHandler(Leg);

    #[async_trait::async_trait]
    impl BatchHandler for NoopHandler {
        fn leg(&self) -> Leg {
            self.0
        }

        async fn handle_batch(&self, _messages: &[ReceivedMessage]) -> BatchResponse {
            BatchResponse::default()
        }
    }

    async fn pipeline(config: PipelineConfig, stock: &[(&str, u32)]) -> Pipeline {
        let inventory = InMemoryInventoryStore::new();
        inventory
            .seed(stock.iter().map(|(id, n)| InventoryRecord::new(*id, *n)))
            .await;
        PipelineBuilder::new(config)
            .inventory_store(Arc::new(inventory))
            .settlement(Arc::new(FixedSettlement::completed()))
            .build()
            .unwrap()
    }

    async fn stock(p: &Pipeline, id: &str) -> u32 {
        p.inventory().get(id).await.unwrap().unwrap().available_stock
    }

    fn basket(customer: &str, items: &[(&str, u32, f64)]) -> CheckoutRequest {
        CheckoutRequest::new(
            customer,
            items
                .iter()
                .map(|(id, qty, price)| BasketLine::new(*id, *qty, *price))
                .collect(),
        )
    }

    #[tokio::test]
    async fn alice_checkout_reaches_every_leg() {
        let p = pipeline(PipelineConfig::default(), &[("p1", 5)]).await;

        let receipt = p.checkout(basket("alice", &[("p1", 2, 10.0)])).await.unwrap();
        assert_eq!(receipt.report.delivered().count(), 3);
        p.drain().await.unwrap();

        assert_eq!(stock(&p, "p1").await, 3);
        let orders = p.orders().orders_for_customer("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_price, Money::from_cents(2000));
        assert_eq!(orders[0].correlation_id, Some(receipt.correlation_id));

        let payments = p.payments_for_customer("alice").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status(), PaymentStatus::Completed);
        assert_eq!(payments[0].amount, Money::from_cents(2000));

        assert!(p.status().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn insufficient_stock_fails_only_the_inventory_leg() {
        let p = pipeline(PipelineConfig::default(), &[("p1", 1)]).await;

        p.checkout(basket("alice", &[("p1", 2, 10.0)])).await.unwrap();
        let summary = p.drain().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(stock(&p, "p1").await, 1);
        assert_eq!(p.orders().list().await.unwrap().len(), 1);
        assert_eq!(p.list_payments().await.unwrap().len(), 1);

        let status = p.status().await.unwrap();
        assert_eq!(status.leg(Leg::Inventory).unwrap().counts.in_flight, 1);
        assert_eq!(status.leg(Leg::Order).unwrap().counts.acked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivery_decrements_earlier_items_again() {
        let p = pipeline(PipelineConfig::default(), &[("p1", 10), ("p2", 1)]).await;

        p.checkout(basket("alice", &[("p1", 3, 1.0), ("p2", 2, 1.0)]))
            .await
            .unwrap();
        p.drain().await.unwrap();
        assert_eq!(stock(&p, "p1").await, 7);

        tokio::time::advance(Duration::from_secs(31)).await;
        p.drain().await.unwrap();
        assert_eq!(stock(&p, "p1").await, 4);
        assert_eq!(stock(&p, "p2").await, 1);
        // Order and payment legs were acked the first time.
        assert_eq!(p.orders().list().await.unwrap().len(), 1);
        assert_eq!(p.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redrive_limit_dead_letters_the_message() {
        let config = PipelineConfig {
            max_receive_count: Some(2),
            ..PipelineConfig::default()
        };
        let p = pipeline(config, &[("p1", 1)]).await;

        p.checkout(basket("alice", &[("p1", 2, 10.0)])).await.unwrap();
        for _ in 0..3 {
            p.drain().await.unwrap();
            tokio::time::advance(Duration::from_secs(31)).await;
        }
        p.drain().await.unwrap();

        let status = p.status().await.unwrap();
        assert_eq!(status.leg(Leg::Inventory).unwrap().counts.dead, 1);
        assert!(status.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_target_leaves_other_legs_running() {
        let p = pipeline(PipelineConfig::default(), &[("p1", 5)]).await;
        p.queue(Leg::Inventory).unwrap().close();

        let receipt = p.checkout(basket("alice", &[("p1", 2, 10.0)])).await.unwrap();
        let failed: Vec<_> = receipt.report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].target, INVENTORY_QUEUE);

        p.drain().await.unwrap();
        assert_eq!(stock(&p, "p1").await, 5);
        assert_eq!(p.orders().list().await.unwrap().len(), 1);
        assert_eq!(p.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settlement_event_is_dropped_by_the_bus() {
        let p = pipeline(PipelineConfig::default(), &[("p1", 5)]).await;
        p.checkout(basket("alice", &[("p1", 1, 10.0)])).await.unwrap();
        let summary = p.drain().await.unwrap();

        // Three checkout copies, nothing more: no queue receives the settlement.
        assert_eq!(summary.received, 3);
        assert_eq!(summary.acked, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn started_pipeline_processes_checkouts() {
        let config = PipelineConfig {
            poll_wait: Duration::from_millis(100),
            ..PipelineConfig::default()
        };
        let p = pipeline(config, &[("p1", 5)]).await;
        let running = p.start();

        p.checkout(basket("alice", &[("p1", 2, 10.0)])).await.unwrap();
        p.checkout(basket("bob", &[("p1", 1, 10.0)])).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        running.shutdown().await;

        assert_eq!(stock(&p, "p1").await, 2);
        assert_eq!(p.orders().list().await.unwrap().len(), 2);
        assert_eq!(p.list_payments().await.unwrap().len(), 2);
    }

    #[test]
    fn build_fails_when_an_expected_leg_is_removed() {
        let err = PipelineBuilder::default()
            .without_leg(Leg::Payment)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::MissingConsumers(ref legs) if legs == &vec![Leg::Payment]));
    }

    #[test]
    fn build_fails_without_targets() {
        let err = PipelineBuilder::default()
            .expect_legs(&[])
            .without_leg(Leg::Order)
            .without_leg(Leg::Inventory)
            .without_leg(Leg::Payment)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::NoTargets));
    }

    #[test]
    fn build_rejects_handler_on_wrong_queue() {
        let err = PipelineBuilder::default()
            .handler(Leg::Order, Arc::new(NoopHandler(Leg::Payment)))
            .build()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BuildError::LegMismatch {
                slot: Leg::Order,
                handler: Leg::Payment
            }
        ));
    }

    #[test]
    fn narrowed_expectations_allow_a_partial_pipeline() {
        let p = PipelineBuilder::default()
            .expect_legs(&[Leg::Order])
            .without_leg(Leg::Inventory)
            .without_leg(Leg::Payment)
            .build()
            .unwrap();
        assert!(p.queue(Leg::Order).is_some());
        assert!(p.queue(Leg::Payment).is_none());
    }
}
