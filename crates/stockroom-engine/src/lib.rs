//! # Stockroom Engines
//!
//! The transactional heart of the back office: every business operation —
//! create invoice, record payment, create order, process return — runs in
//! exactly one database transaction, with stock movements routed through the
//! ledger exclusively.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       stockroom-engine                                  │
//! │                                                                         │
//! │  sales        POS invoices: reserve → pay → deduct → complete          │
//! │  fulfillment  online orders: deduct at creation, persist transitions   │
//! │  returns      cumulative-quantity guard, restock, parent rollup        │
//! │  finance      advisory cash-position snapshot (read-only)              │
//! │  hooks        ShippingRate / EventSink collaborator traits             │
//! │  error        EngineError = Domain | Db                                │
//! │                                                                         │
//! │  depends on:  stockroom-db (ledger + repositories)                     │
//! │               stockroom-core (types, Money, finance buckets)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod finance;
pub mod fulfillment;
pub mod hooks;
pub mod returns;
pub mod sales;

pub use error::{EngineError, EngineResult};
pub use finance::{DateRange, FinanceReconciliation};
pub use fulfillment::{FulfillmentEngine, OrderDetail};
pub use hooks::{DomainEvent, EventSink, FlatShippingRate, ShipmentLine, ShippingRate, TracingSink};
pub use returns::{ReturnDetail, ReturnLineRequest, ReturnRequest, ReturnsEngine};
pub use sales::{InvoiceDetail, InvoiceLineRequest, SalesEngine};

// =============================================================================
// Test Utilities
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use stockroom_core::types::{CartItem, Employee, Location, Product, StockItem, Variant};
    use stockroom_core::Money;
    use stockroom_db::repository::{cart, catalog, payment};
    use stockroom_db::{bootstrap, ledger, Database, DbConfig};

    use crate::finance::FinanceReconciliation;
    use crate::fulfillment::FulfillmentEngine;
    use crate::hooks::{FlatShippingRate, TracingSink};
    use crate::returns::ReturnsEngine;
    use crate::sales::SalesEngine;

    /// A seeded in-memory world: one location, one variant (cost 60,
    /// retail 100), one employee at 2.5% commission, bootstrap payment
    /// methods, flat 30 shipping.
    pub struct TestWorld {
        pub db: Database,
        pub location_id: String,
        pub variant_id: String,
        pub employee_id: String,
        pub cash_method_id: String,
    }

    impl TestWorld {
        pub fn sales(&self) -> SalesEngine {
            SalesEngine::new(self.db.clone(), Arc::new(TracingSink))
        }

        pub fn fulfillment(&self) -> FulfillmentEngine {
            FulfillmentEngine::new(
                self.db.clone(),
                Arc::new(FlatShippingRate(Money::from_major(30))),
            )
        }

        pub fn returns(&self) -> ReturnsEngine {
            ReturnsEngine::new(self.db.clone(), Arc::new(TracingSink))
        }

        pub fn finance(&self) -> FinanceReconciliation {
            FinanceReconciliation::new(self.db.clone())
        }

        pub async fn stock_item(&self) -> StockItem {
            let mut conn = self.db.pool().acquire().await.unwrap();
            ledger::stock_item(&mut *conn, &self.variant_id, &self.location_id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    pub async fn test_world() -> TestWorld {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        bootstrap::seed_payment_methods(db.pool()).await.unwrap();
        let now = Utc::now();

        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: "Main Store".into(),
            is_active: true,
            created_at: now,
        };
        catalog::insert_location(db.pool(), &location).await.unwrap();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Basic Tee".into(),
            cost_price: Money::from_major(60),
            retail_price: Money::from_major(100),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        catalog::insert_product(db.pool(), &product).await.unwrap();

        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            sku: "TEE-M".into(),
            cost_price: None,
            retail_price: None,
            weight_grams: 200,
            is_active: true,
            created_at: now,
        };
        catalog::insert_variant(db.pool(), &variant).await.unwrap();

        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: "Sara".into(),
            commission_rate_bps: 250,
            created_at: now,
        };
        catalog::insert_employee(db.pool(), &employee).await.unwrap();

        let cash = payment::method_by_code(db.pool(), "cash_pos")
            .await
            .unwrap()
            .unwrap();

        TestWorld {
            db,
            location_id: location.id,
            variant_id: variant.id,
            employee_id: employee.id,
            cash_method_id: cash.id,
        }
    }

    /// Adds physical stock for the world's variant at its location.
    pub async fn stock(w: &TestWorld, qty: i64) {
        let mut conn = w.db.pool().acquire().await.unwrap();
        ledger::add(&mut conn, &w.variant_id, &w.location_id, qty)
            .await
            .unwrap();
    }

    /// Puts one cart line of `qty` units of the world's variant in a user's
    /// cart.
    pub async fn fill_cart(w: &TestWorld, user_id: &str, qty: i64) {
        cart::add_cart_item(
            w.db.pool(),
            &CartItem {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                variant_id: w.variant_id.clone(),
                quantity: qty,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }
}
