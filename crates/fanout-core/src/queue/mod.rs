//! Queue module: message state, redelivery policies, and the in-memory
//! visibility-timeout queue behind the `MessageQueue` port.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryQueue;
pub use record::MessageRecord;
pub use retry::{RedrivePolicy, RetryPolicy};
pub use state::MessageState;
