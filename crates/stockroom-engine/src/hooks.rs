//! # External Collaborators
//!
//! Trait seams for the two things the core consumes but does not implement:
//! shipping-rate lookup and outbound notifications. The HTTP/courier/email
//! machinery behind them lives outside this workspace.

use serde::{Deserialize, Serialize};
use tracing::info;

use stockroom_core::Money;

// =============================================================================
// Shipping
// =============================================================================

/// One order line as seen by a shipping-rate provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub variant_id: String,
    pub quantity: i64,
    /// Unit weight from the variant record.
    pub weight_grams: i64,
}

/// Quotes a shipping fee for a delivery address and set of lines.
///
/// Must be a pure function of its inputs: no side effects, no awaiting
/// external systems from inside an order transaction. Implementations that
/// need remote data should resolve it before `create_order` is called.
pub trait ShippingRate: Send + Sync {
    fn quote(&self, address_id: &str, lines: &[ShipmentLine]) -> Money;
}

/// Flat fee regardless of address or weight. Useful default for development
/// and tests.
#[derive(Debug, Clone)]
pub struct FlatShippingRate(pub Money);

impl ShippingRate for FlatShippingRate {
    fn quote(&self, _address_id: &str, _lines: &[ShipmentLine]) -> Money {
        self.0
    }
}

// =============================================================================
// Events
// =============================================================================

/// Lifecycle notifications emitted AFTER the owning transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    InvoiceCompleted { invoice_id: String, total: Money },
    ReturnCreated { return_id: String, refund_total: Money },
}

/// Fire-and-forget notification sink.
///
/// Engines call `notify` only after commit, and never propagate failures
/// from it: a sink that throws away events cannot roll back a sale.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &DomainEvent);
}

/// Default sink: structured log line per event.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &DomainEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => info!(%payload, "domain event"),
            Err(_) => info!(?event, "domain event"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_rate_ignores_inputs() {
        let rate = FlatShippingRate(Money::from_major(30));
        let lines = vec![ShipmentLine {
            variant_id: "var-1".into(),
            quantity: 3,
            weight_grams: 200,
        }];
        assert_eq!(rate.quote("addr-1", &lines), Money::from_major(30));
        assert_eq!(rate.quote("addr-2", &[]), Money::from_major(30));
    }

    #[test]
    fn events_serialize_tagged() {
        let event = DomainEvent::InvoiceCompleted {
            invoice_id: "inv-1".into(),
            total: Money::from_major(300),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"invoice_completed\""));
        assert!(json.contains("\"total\":\"300\""));
    }
}
