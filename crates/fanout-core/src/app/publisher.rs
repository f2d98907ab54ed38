//! CheckoutPublisher - turns a checkout request into one bus event.
//!
//! The only synchronous step of a checkout: validate, build the event,
//! publish it once. What the consumers later do with it is invisible to the
//! caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::checkout::{CheckoutEvent, CheckoutRequest};
use crate::domain::envelope::{BusEvent, CHECKOUT_DETAIL_TYPE, CHECKOUT_SOURCE};
use crate::domain::errors::PipelineError;
use crate::domain::ids::{CorrelationId, EventId};
use crate::domain::money::Money;
use crate::ports::{Clock, EventPublisher, IdGenerator, PublishReport};

/// What the caller gets back once the bus accepted the event.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub correlation_id: CorrelationId,
    pub event_id: EventId,
    pub customer_id: String,
    pub total_price: Money,
    pub order_date: DateTime<Utc>,
    pub report: PublishReport,
}

pub struct CheckoutPublisher {
    publisher: Arc<dyn EventPublisher>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl CheckoutPublisher {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            publisher,
            ids,
            clock,
        }
    }

    /// Validates the request and publishes exactly one checkout event.
    ///
    /// `Ok` means the bus accepted the event; targets that refused it are
    /// listed in the receipt's report. The basket is not touched.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, PipelineError> {
        let now = self.clock.now();
        let event = CheckoutEvent::from_request(request, self.ids.correlation_id(), now)?;

        let bus_event = BusEvent::new(
            self.ids.event_id(),
            CHECKOUT_SOURCE,
            CHECKOUT_DETAIL_TYPE,
            now,
            &event,
        )?;
        let event_id = bus_event.id;

        let report = self
            .publisher
            .put_event(bus_event)
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;

        for failed in report.failed() {
            warn!(
                correlation_id = %event.correlation_id,
                target = %failed.target,
                error = failed.error.as_deref().unwrap_or_default(),
                "checkout event missed a target"
            );
        }
        info!(
            customer_id = %event.customer_id,
            correlation_id = %event.correlation_id,
            event_id = %event_id,
            total_price = %event.total_price,
            items = event.items.len(),
            "checkout published"
        );

        Ok(CheckoutReceipt {
            correlation_id: event.correlation_id,
            event_id,
            customer_id: event.customer_id,
            total_price: event.total_price,
            order_date: event.order_date,
            report,
        })
    }
}
