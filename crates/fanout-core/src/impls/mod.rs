//! Impls - in-memory adapters for every port, plus the stock settlement
//! policies and decrement strategies.
//!
//! Production adapters (a key-value store, a hosted queue, a hosted bus)
//! implement the same ports in their own crates.

pub mod decrement;
pub mod inmem_bus;
pub mod inmem_inventory;
pub mod inmem_order;
pub mod inmem_payment;
pub mod settlement;

pub use self::decrement::{AllOrNothing, ItemByItem};
pub use self::inmem_bus::{InMemoryEventBus, Rule};
pub use self::inmem_inventory::InMemoryInventoryStore;
pub use self::inmem_order::InMemoryOrderStore;
pub use self::inmem_payment::InMemoryPaymentStore;
pub use self::settlement::{
    DEFAULT_FAILURE_REASON, DEFAULT_SUCCESS_RATIO, FixedSettlement, RandomSettlement,
};
