//! fanout-core
//!
//! Checkout fan-out pipeline: one checkout event, routed by an event bus to
//! three visibility-timeout queues, each drained by an independent consumer.
//!
//! # Modules
//! - **domain**: ids, money, checkout event, order / inventory / payment records, errors
//! - **ports**: store, queue, bus, clock, id, settlement and decrement seams
//! - **queue**: in-memory visibility-timeout queue, retry and redrive policies
//! - **impls**: in-memory stores and bus, settlement policies, decrement strategies
//! - **consumers**: order recorder, inventory decrementer, payment processor
//! - **app**: checkout publisher, consumer groups, pipeline wiring and status
//! - **config**: `FANOUT_*` environment configuration

pub mod app;
pub mod config;
pub mod consumers;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{Pipeline, PipelineBuilder};
pub use config::PipelineConfig;
pub use domain::errors::PipelineError;
