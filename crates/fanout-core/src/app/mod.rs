//! App - the pipeline assembled from ports.
//!
//! # Components
//! - **CheckoutPublisher**: validates a checkout and publishes one event
//! - **ConsumerGroup**: receive → handle → ack loop per queue
//! - **PipelineBuilder / Pipeline**: wiring, start, drain, status
//! - **PipelineStatus**: per-queue counts

pub mod builder;
pub mod publisher;
pub mod status;
pub mod worker_loop;

pub use self::builder::{
    BuildError, CHECKOUT_RULE, DrainSummary, EVENT_BUS, INVENTORY_QUEUE, ORDER_QUEUE,
    PAYMENT_QUEUE, Pipeline, PipelineBuilder, RunningPipeline,
};
pub use self::publisher::{CheckoutPublisher, CheckoutReceipt};
pub use self::status::{PipelineStatus, QueueStatus};
pub use self::worker_loop::{BatchSummary, ConsumerGroup, ConsumerOptions, poll_once, process_batch};
