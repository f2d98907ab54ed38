//! Message state machine for the queue.

use serde::{Deserialize, Serialize};

/// Message state.
///
/// State transitions:
/// - Visible -> InFlight -> (acked, record dropped)
/// - Visible -> InFlight -> Visible (visibility timeout lapsed, redelivery)
/// - Visible -> Dead (receive count exhausted by the redrive policy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    /// Can be received.
    Visible,

    /// Handed to a consumer and hidden until its visibility deadline.
    InFlight,

    /// Moved aside after too many receives.
    Dead,
}

impl MessageState {
    pub fn is_receivable(self) -> bool {
        matches!(self, MessageState::Visible)
    }
}
