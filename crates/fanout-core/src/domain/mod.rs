//! Domain model: ids, money, the checkout event, the three record types,
//! the bus envelope and the error taxonomy.

pub mod checkout;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod inventory;
pub mod money;
pub mod order;
pub mod payment;
pub mod state;

pub use checkout::{
    BasketLine, CheckoutDetail, CheckoutEvent, CheckoutRequest, DetailLine, LineItem,
    ShippingDetails,
};
pub use envelope::{
    BusEvent, CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE, EventPattern, PAYMENT_SOURCE,
};
pub use errors::{ErrorKind, PipelineError, StoreError, ValidationError};
pub use ids::{
    CorrelationId, EventId, MessageId, PaymentId, ReceiptHandle, TransactionId,
};
pub use inventory::{DEFAULT_REORDER_LEVEL, InventoryRecord, StockChange};
pub use money::Money;
pub use order::{DEFAULT_PAYMENT_METHOD, OrderRecord};
pub use payment::{PaymentOutcome, PaymentRecord, PaymentStatus, SettlementEvent};
pub use state::{Leg, LegState};
