//! Order snapshot written by the order recorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checkout::{CheckoutDetail, LineItem, ShippingDetails};
use super::ids::CorrelationId;
use super::money::Money;

/// Payment method recorded when the checkout did not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";

/// Keyed by `(customer_id, order_timestamp)`.
///
/// `order_timestamp` is the processing time, not the checkout time, so a
/// redelivered checkout event produces a second record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub customer_id: String,
    pub order_timestamp: DateTime<Utc>,
    pub total_price: Money,
    pub shipping_details: ShippingDetails,
    pub payment_method: String,
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl OrderRecord {
    pub fn snapshot(detail: &CheckoutDetail, processed_at: DateTime<Utc>) -> Self {
        Self {
            customer_id: detail.customer_id.clone(),
            order_timestamp: processed_at,
            total_price: detail.total(),
            shipping_details: detail.shipping_details.clone().unwrap_or_default(),
            payment_method: detail
                .payment_method
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            items: detail.line_items(),
            correlation_id: detail.correlation_id,
        }
    }

    pub fn key(&self) -> (String, DateTime<Utc>) {
        (self.customer_id.clone(), self.order_timestamp)
    }
}
