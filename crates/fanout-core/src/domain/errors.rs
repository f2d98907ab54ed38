//! Error taxonomy of the pipeline.
//!
//! ```text
//! ValidationError   bad checkout input, surfaced to the caller, never retried
//! StoreError        what a store adapter reports
//! PipelineError     what a publisher or consumer reports per message
//! ```
//!
//! Consumers turn any `PipelineError` into a per-message failure. The queue
//! then redelivers the message after its visibility timeout; the error kind
//! only decides how loudly it is logged.

use thiserror::Error;

/// Operational classification of a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input. Not retried.
    Validation,
    /// Business rejection (e.g. not enough stock). Retried until the
    /// redrive limit moves the message to the dead-letter state.
    Business,
    /// Network / throttling. Retried via redelivery.
    Transient,
    /// Programming or configuration error.
    Fatal,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Business | ErrorKind::Transient)
    }
}

/// Checkout input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("customer id is missing")]
    MissingCustomer,

    #[error("basket is empty")]
    EmptyBasket,

    #[error("line {line}: product id is missing")]
    MissingProductId { line: usize },

    #[error("product {product_id}: quantity must be at least 1, got {quantity}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    #[error("product {product_id}: price must be a non-negative number")]
    InvalidPrice { product_id: String },
}

/// Failures reported by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The conditional write's precondition did not hold; nothing was written.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    ConditionFailed {
        product_id: String,
        available: u32,
        requested: u32,
    },

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The store could not be reached or throttled the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the checkout publisher and the three consumers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: u32,
        requested: u32,
    },

    #[error("transient store error: {0}")]
    TransientStore(String),

    #[error("unsupported event type: source={source_name} detail-type={detail_type}")]
    UnsupportedEventType {
        source_name: String,
        detail_type: String,
    },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("event bus rejected the event: {0}")]
    Publish(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::InsufficientStock { .. } => ErrorKind::Business,
            PipelineError::TransientStore(_) | PipelineError::Publish(_) => ErrorKind::Transient,
            PipelineError::UnsupportedEventType { .. } | PipelineError::InvalidMessage(_) => {
                ErrorKind::Fatal
            }
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed {
                product_id,
                available,
                requested,
            } => PipelineError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            other => PipelineError::TransientStore(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::InvalidMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PipelineError::Validation(ValidationError::EmptyBasket), ErrorKind::Validation)]
    #[case(
        PipelineError::InsufficientStock { product_id: "p1".into(), available: 1, requested: 2 },
        ErrorKind::Business
    )]
    #[case(PipelineError::TransientStore("throttled".into()), ErrorKind::Transient)]
    #[case(
        PipelineError::UnsupportedEventType { source_name: "x".into(), detail_type: "y".into() },
        ErrorKind::Fatal
    )]
    fn classifies_errors(#[case] err: PipelineError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn condition_failure_maps_to_insufficient_stock() {
        let err: PipelineError = StoreError::ConditionFailed {
            product_id: "p1".into(),
            available: 1,
            requested: 2,
        }
        .into();
        assert!(matches!(
            err,
            PipelineError::InsufficientStock { ref product_id, available: 1, requested: 2 } if product_id == "p1"
        ));
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn unavailable_store_is_transient() {
        let err: PipelineError = StoreError::Unavailable("timeout".into()).into();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
