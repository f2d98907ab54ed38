//! Bus envelope and the patterns rules match it with.
//!
//! Queue message bodies are the JSON form of [`BusEvent`]:
//! `{"id", "source", "detail-type", "time", "detail": {...}}`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ids::EventId;

/// Source of checkout events emitted by the basket service.
pub const CHECKOUT_SOURCE: &str = "com.swn.basket.checkoutbasket";
/// Detail-type of checkout events.
pub const CHECKOUT_DETAIL_TYPE: &str = "CheckoutBasket";
/// Source of settlement events emitted by the payment processor.
pub const PAYMENT_SOURCE: &str = "com.swn.payment";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: EventId,
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub time: DateTime<Utc>,
    pub detail: serde_json::Value,
}

impl BusEvent {
    pub fn new<T: Serialize>(
        id: EventId,
        source: impl Into<String>,
        detail_type: impl Into<String>,
        time: DateTime<Utc>,
        detail: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            source: source.into(),
            detail_type: detail_type.into(),
            time,
            detail: serde_json::to_value(detail)?,
        })
    }

    pub fn detail_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.detail)
    }

    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// `(source, detail-type)` pattern. An empty list matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPattern {
    pub sources: Vec<String>,
    pub detail_types: Vec<String>,
}

impl EventPattern {
    pub fn exact(source: impl Into<String>, detail_type: impl Into<String>) -> Self {
        Self {
            sources: vec![source.into()],
            detail_types: vec![detail_type.into()],
        }
    }

    /// The pattern of the checkout rule.
    pub fn checkout() -> Self {
        Self::exact(CHECKOUT_SOURCE, CHECKOUT_DETAIL_TYPE)
    }

    pub fn matches(&self, source: &str, detail_type: &str) -> bool {
        let hit = |allowed: &[String], value: &str| {
            allowed.is_empty() || allowed.iter().any(|a| a == value)
        };
        hit(&self.sources, source) && hit(&self.detail_types, detail_type)
    }
}
