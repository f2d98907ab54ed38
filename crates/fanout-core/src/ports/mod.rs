//! Ports - the seams between the pipeline and its collaborators.
//!
//! Stores, queues and the bus are traits here; `impls` has in-memory
//! adapters. The clock, id generator, settlement policy and decrement
//! strategy are ports too, so tests can pin time, randomness and the
//! partial-failure policy.

pub mod clock;
pub mod decrement;
pub mod event_publisher;
pub mod id_generator;
pub mod inventory_store;
pub mod message_queue;
pub mod order_store;
pub mod payment_store;
pub mod settlement;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decrement::{DecrementReport, DecrementStrategy};
pub use self::event_publisher::{BusError, EventPublisher, PublishReport, TargetDelivery};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::inventory_store::{InventoryStore, StockRequest};
pub use self::message_queue::{MessageQueue, QueueCounts, QueueError, ReceivedMessage};
pub use self::order_store::OrderStore;
pub use self::payment_store::PaymentStore;
pub use self::settlement::{SettlementDecision, SettlementPolicy};
