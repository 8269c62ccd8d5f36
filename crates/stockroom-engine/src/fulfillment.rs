//! # Fulfillment Engine (Online Orders)
//!
//! Online orders have no reservation phase: stock is deducted the moment the
//! order is created, inside the order's transaction. Later status changes
//! (confirmed → shipped → delivered) are driven by the external courier
//! process and persisted here with no stock side-effects.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stockroom_core::types::{Order, OrderItem, OrderPaymentStatus, OrderStatus};
use stockroom_core::{validation, CoreError, Money};
use stockroom_db::repository::{cart, catalog, order};
use stockroom_db::{ledger, Database};

use crate::error::{EngineError, EngineResult};
use crate::hooks::{ShipmentLine, ShippingRate};

/// An order with its lines.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub struct FulfillmentEngine {
    db: Database,
    shipping: Arc<dyn ShippingRate>,
}

impl FulfillmentEngine {
    pub fn new(db: Database, shipping: Arc<dyn ShippingRate>) -> Self {
        FulfillmentEngine { db, shipping }
    }

    /// Creates an order from the user's cart.
    ///
    /// One transaction: pick the default fulfillment location, deduct stock
    /// per cart line (immediately, no soft hold), snapshot pricing, quote
    /// shipping, persist order + lines, clear the cart. Any
    /// insufficient-stock line rolls back every prior deduction.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        user_id: &str,
        delivery_address_id: &str,
        payment_method: &str,
    ) -> EngineResult<Order> {
        validation::required("user_id", user_id)?;
        validation::required("delivery_address_id", delivery_address_id)?;
        validation::required("payment_method", payment_method)?;

        let mut tx = self.db.begin().await?;

        let cart_lines = cart::cart_for_user(&mut *tx, user_id).await?;
        validation::non_empty_lines("cart", &cart_lines)?;

        let location = catalog::default_fulfillment_location(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::not_found("Location", "no active location"))?;

        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut subtotal = Money::zero();
        let mut items = Vec::with_capacity(cart_lines.len());
        let mut shipment = Vec::with_capacity(cart_lines.len());

        for line in &cart_lines {
            let variant = catalog::get_variant(&mut *tx, &line.variant_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Variant", &line.variant_id))?;
            let pricing = catalog::variant_pricing(&mut *tx, &line.variant_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Variant", &line.variant_id))?;

            // Hard deduction at creation time, gated on available (not raw)
            // quantity: units soft-held for pending invoices stay held.
            ledger::deduct_available(&mut tx, &line.variant_id, &location.id, line.quantity)
                .await?;

            let line_total = pricing.retail_price.times(line.quantity);
            subtotal += line_total;

            items.push(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
                unit_price: pricing.retail_price,
                cost_price: pricing.cost_price,
                line_total,
                created_at: now,
            });
            shipment.push(ShipmentLine {
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
                weight_grams: variant.weight_grams,
            });
        }

        let shipping_fee = self.shipping.quote(delivery_address_id, &shipment);

        let record = Order {
            id: order_id.clone(),
            user_id: user_id.to_string(),
            location_id: location.id.clone(),
            delivery_address_id: delivery_address_id.to_string(),
            payment_method: payment_method.to_string(),
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
            created_at: now,
            updated_at: now,
        };

        order::insert_order(&mut *tx, &record).await?;
        for item in &items {
            order::insert_order_item(&mut *tx, item).await?;
        }
        cart::clear_cart(&mut *tx, user_id).await?;

        tx.commit().await.map_err(EngineError::from)?;

        info!(order_id = %record.id, total = %record.total, "order created");
        Ok(record)
    }

    /// Persists a status transition decided by the external fulfillment
    /// process. No stock side-effects: stock left the pool at creation.
    ///
    /// Cancelled and returned orders are settled by their own flows, so a
    /// plain status update on one is refused.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;

        let record = order::get_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        match record.status {
            OrderStatus::Cancelled | OrderStatus::Returned | OrderStatus::PartiallyReturned => {
                warn!(order_id, current = %record.status, "refusing status update");
                return Err(CoreError::invalid_transition(
                    "Order",
                    order_id,
                    record.status.as_str(),
                    "update status",
                )
                .into());
            }
            _ => {}
        }

        order::set_status(&mut *tx, order_id, new_status).await?;
        tx.commit().await.map_err(EngineError::from)?;

        info!(order_id, status = %new_status, "order status updated");
        Ok(())
    }

    /// Loads an order with its lines.
    pub async fn get_order(&self, order_id: &str) -> EngineResult<OrderDetail> {
        let record = order::get_order(self.db.pool(), order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        let items = order::get_order_items(self.db.pool(), order_id).await?;

        Ok(OrderDetail {
            order: record,
            items,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fill_cart, stock, test_world};

    #[tokio::test]
    async fn order_deducts_immediately_and_clears_cart() {
        let w = test_world().await;
        stock(&w, 10).await;
        fill_cart(&w, "user-1", 2).await;
        let engine = w.fulfillment();

        let ord = engine
            .create_order("user-1", "addr-1", "cash on delivery")
            .await
            .unwrap();

        // retail 100 × 2 + flat 30 shipping
        assert_eq!(ord.subtotal, Money::from_major(200));
        assert_eq!(ord.shipping_fee, Money::from_major(30));
        assert_eq!(ord.total, Money::from_major(230));
        assert_eq!(ord.status, OrderStatus::Pending);

        let item = w.stock_item().await;
        assert_eq!(item.quantity, 8);
        assert_eq!(item.reserved_quantity, 0);

        let left = cart::cart_for_user(w.db.pool(), "user-1").await.unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_order() {
        let w = test_world().await;
        stock(&w, 1).await;
        fill_cart(&w, "user-1", 3).await;
        let engine = w.fulfillment();

        let err = engine
            .create_order("user-1", "addr-1", "cod")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::InsufficientStock { .. })
        ));

        // Nothing deducted, cart intact
        assert_eq!(w.stock_item().await.quantity, 1);
        let left = cart::cart_for_user(w.db.pool(), "user-1").await.unwrap();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn order_cannot_consume_reserved_stock() {
        // quantity=5, all 5 soft-held by a pending invoice: an online order
        // for 5 sees available=0, and the invoice can still complete.
        let w = test_world().await;
        stock(&w, 5).await;

        let inv = w
            .sales()
            .create_invoice(
                vec![crate::sales::InvoiceLineRequest {
                    variant_id: w.variant_id.clone(),
                    quantity: 5,
                    unit_price: None,
                }],
                &w.location_id,
                &w.employee_id,
            )
            .await
            .unwrap();

        fill_cart(&w, "user-1", 5).await;
        let err = w
            .fulfillment()
            .create_order("user-1", "addr-1", "cod")
            .await
            .unwrap_err();
        match err {
            EngineError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 0);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }

        // The hold survived the rejected order
        let item = w.stock_item().await;
        assert_eq!(item.quantity, 5);
        assert_eq!(item.reserved_quantity, 5);

        // and the invoice still completes against it.
        w.sales()
            .create_payment(&inv.id, &w.cash_method_id, inv.total)
            .await
            .unwrap();
        let item = w.stock_item().await;
        assert_eq!(item.quantity, 0);
        assert_eq!(item.reserved_quantity, 0);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let w = test_world().await;
        let engine = w.fulfillment();

        let err = engine
            .create_order("user-9", "addr-1", "cod")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn status_updates_persist_without_stock_changes() {
        let w = test_world().await;
        stock(&w, 5).await;
        fill_cart(&w, "user-1", 1).await;
        let engine = w.fulfillment();

        let ord = engine
            .create_order("user-1", "addr-1", "cod")
            .await
            .unwrap();
        let after_create = w.stock_item().await.quantity;

        engine
            .update_order_status(&ord.id, OrderStatus::Shipped)
            .await
            .unwrap();
        engine
            .update_order_status(&ord.id, OrderStatus::Delivered)
            .await
            .unwrap();

        let detail = engine.get_order(&ord.id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Delivered);
        assert_eq!(w.stock_item().await.quantity, after_create);
    }

    #[tokio::test]
    async fn cancelled_order_refuses_plain_updates() {
        let w = test_world().await;
        stock(&w, 5).await;
        fill_cart(&w, "user-1", 1).await;
        let engine = w.fulfillment();

        let ord = engine
            .create_order("user-1", "addr-1", "cod")
            .await
            .unwrap();
        engine
            .update_order_status(&ord.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = engine
            .update_order_status(&ord.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::InvalidStateTransition { .. })
        ));
    }
}
