//! Checkout request (what the basket service hands over) and the checkout
//! event fanned out to the three downstream queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::ids::CorrelationId;
use super::money::Money;

/// Shipping details captured at checkout, copied into the order snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
}

/// One basket line as received from the basket service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketLine {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total: Option<f64>,
}

impl BasketLine {
    pub fn new(product_id: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
            order_total: None,
        }
    }
}

/// Checkout trigger: `{customerId, items: [{productId, quantity, price}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub items: Vec<BasketLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl CheckoutRequest {
    pub fn new(customer_id: impl Into<String>, items: Vec<BasketLine>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            items,
            ..Self::default()
        }
    }
}

/// A validated line of the checkout event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total: Option<Money>,
}

impl LineItem {
    /// Explicit line total when the basket supplied one, otherwise
    /// `quantity * unit_price`.
    pub fn line_total(&self) -> Money {
        self.order_total
            .unwrap_or_else(|| self.unit_price.times(self.quantity))
    }
}

/// The single event emitted per checkout call.
///
/// There is no idempotency key: `correlation_id` only lets an external job
/// join the three legs, nothing downstream deduplicates on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutEvent {
    pub correlation_id: CorrelationId,
    pub customer_id: String,
    pub order_date: DateTime<Utc>,
    #[serde(default)]
    pub total_price: Money,
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl CheckoutEvent {
    /// Validates a checkout request and builds the event.
    pub fn from_request(
        request: CheckoutRequest,
        correlation_id: CorrelationId,
        order_date: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let customer_id = request
            .customer_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ValidationError::MissingCustomer)?;

        if request.items.is_empty() {
            return Err(ValidationError::EmptyBasket);
        }

        let items = request
            .items
            .into_iter()
            .enumerate()
            .map(|(line, item)| validate_line(line, item))
            .collect::<Result<Vec<_>, _>>()?;

        let total_price = items.iter().map(LineItem::line_total).sum();

        Ok(Self {
            correlation_id,
            customer_id,
            order_date,
            total_price,
            items,
            shipping_details: request.shipping_details,
            payment_method: request.payment_method,
        })
    }
}

/// The checkout detail as the order and payment consumers read it.
///
/// Accepts both the event this pipeline publishes and a bare
/// `{customerId, orderDate, totalPrice, items}` body whose lines carry
/// basket-style `price`. Only `customerId` is required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetail {
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    pub customer_id: String,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_price: Option<Money>,
    #[serde(default)]
    pub items: Vec<DetailLine>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl CheckoutDetail {
    /// Zero when the detail carries no total.
    pub fn total(&self) -> Money {
        self.total_price.unwrap_or_default()
    }

    /// Lines that name a product and a positive quantity. Anything else is
    /// dropped from the snapshot.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.iter().filter_map(DetailLine::to_line_item).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailLine {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default, alias = "price")]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub order_total: Option<f64>,
}

impl DetailLine {
    fn to_line_item(&self) -> Option<LineItem> {
        let product_id = self.product_id.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
        let quantity = self.quantity.filter(|q| *q > 0)?;
        let unit_price = Money::from_major(self.unit_price.unwrap_or(0.0))
            .filter(|m| !m.is_negative())
            .unwrap_or_default();
        let order_total = self
            .order_total
            .and_then(Money::from_major)
            .filter(|m| !m.is_negative());

        Some(LineItem {
            product_id: product_id.to_string(),
            quantity,
            unit_price,
            order_total,
        })
    }
}

fn validate_line(line: usize, item: BasketLine) -> Result<LineItem, ValidationError> {
    let product_id = item.product_id.trim().to_string();
    if product_id.is_empty() {
        return Err(ValidationError::MissingProductId { line });
    }
    if item.quantity == 0 {
        return Err(ValidationError::InvalidQuantity {
            product_id,
            quantity: item.quantity,
        });
    }

    let invalid_price = || ValidationError::InvalidPrice {
        product_id: product_id.clone(),
    };
    let unit_price = Money::from_major(item.price)
        .filter(|m| !m.is_negative())
        .ok_or_else(invalid_price)?;
    let order_total = match item.order_total {
        Some(total) => Some(
            Money::from_major(total)
                .filter(|m| !m.is_negative())
                .ok_or_else(invalid_price)?,
        ),
        None => None,
    };

    Ok(LineItem {
        product_id,
        quantity: item.quantity,
        unit_price,
        order_total,
    })
}
