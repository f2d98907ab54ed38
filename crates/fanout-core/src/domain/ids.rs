//! Domain identifiers (strongly-typed IDs).
//!
//! Every identifier is a ULID wrapped in `Id<T>`, where `T` is a zero-sized
//! marker. The marker gives each id its own type (a `PaymentId` cannot be
//! passed where a `MessageId` is expected) and its display prefix.
//!
//! ULIDs sort by creation time and can be generated on any node without
//! coordination, which is all the pipeline needs from a key: payment ids,
//! message ids and receipt handles are never coordinated across consumers.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait providing the display prefix of an id type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
///
/// Serialized as its display form (`PAY-01J...`), so ids stay readable in
/// queue bodies and stored records.
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

// Manual impls: derives would require `T: Clone/Copy` on the marker.
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Milliseconds since the epoch encoded in the ULID.
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a string is not a valid id of the expected type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id `{value}`: expected prefix `{expected_prefix}` followed by a ULID")]
pub struct ParseIdError {
    pub value: String,
    pub expected_prefix: &'static str,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            value: s.to_string(),
            expected_prefix: T::prefix(),
        };
        let raw = s.strip_prefix(T::prefix()).ok_or_else(err)?;
        let ulid = Ulid::from_string(raw).map_err(|_| err())?;
        Ok(Self::from_ulid(ulid))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ========================================
// Markers
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Marker for payment records.
    Payment, "PAY-"
);
id_marker!(
    /// Marker for settled transactions.
    Transaction, "TXN-"
);
id_marker!(
    /// Marker for queue messages.
    Message, "msg-"
);
id_marker!(
    /// Marker for a single delivery of a queue message.
    Receipt, "rcpt-"
);
id_marker!(
    /// Marker for bus events.
    Event, "evt-"
);
id_marker!(
    /// Marker for the checkout correlation id.
    Correlation, "chk-"
);

/// Key of a PaymentRecord.
pub type PaymentId = Id<Payment>;

/// Transaction reference of a completed payment.
pub type TransactionId = Id<Transaction>;

/// Identifier of a queue message; stable across redeliveries.
pub type MessageId = Id<Message>;

/// Handle of one delivery of a message. Only the latest receipt can ack.
pub type ReceiptHandle = Id<Receipt>;

/// Identifier of an event accepted by the bus.
pub type EventId = Id<Event>;

/// Joins the order, inventory and payment legs of one checkout.
pub type CorrelationId = Id<Correlation>;
