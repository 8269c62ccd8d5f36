//! # Stockroom Database Layer
//!
//! SQLite persistence for the Stockroom back-office core: connection pool,
//! embedded migrations, the stock ledger and the per-aggregate repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       stockroom-db                                      │
//! │                                                                         │
//! │  pool        SqlitePool setup (WAL, foreign keys), Database::begin()   │
//! │  migrations  embedded sqlx migrations                                  │
//! │  bootstrap   idempotent payment-method seeding                         │
//! │  ledger      atomic stock movements (reserve/release/deduct/add)       │
//! │  repository  row access per aggregate (catalog, invoice, order, ...)   │
//! │  error       sqlx → DbError classification, LedgerError               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Engines (in `stockroom-engine`) own the transactions: one
//! [`Database::begin`] per business operation, with ledger and repository
//! calls running on the transaction's connection.

pub mod bootstrap;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

// =============================================================================
// Test Utilities
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::Utc;
    use uuid::Uuid;

    use stockroom_core::types::{Employee, Location, Product, Variant};
    use stockroom_core::Money;

    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog;

    /// Fresh in-memory database with migrations applied.
    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Ids of the rows seeded by [`seed_minimal_catalog`].
    pub struct SeededCatalog {
        pub location_id: String,
        pub product_id: String,
        pub variant_id: String,
        pub employee_id: String,
    }

    /// One location, one product with one variant (no price overrides), one
    /// employee at 2.5% commission. No stock rows.
    pub async fn seed_minimal_catalog(db: &Database) -> SeededCatalog {
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

        let variant = variant_row(&product.id, "TEE-M", None, None);
        catalog::insert_variant(db.pool(), &variant).await.unwrap();

        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: "Sara".into(),
            commission_rate_bps: 250,
            created_at: now,
        };
        catalog::insert_employee(db.pool(), &employee).await.unwrap();

        SeededCatalog {
            location_id: location.id,
            product_id: product.id,
            variant_id: variant.id,
            employee_id: employee.id,
        }
    }

    /// Builds a variant row with optional price overrides.
    pub fn variant_row(
        product_id: &str,
        sku: &str,
        cost_price: Option<Money>,
        retail_price: Option<Money>,
    ) -> Variant {
        Variant {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            cost_price,
            retail_price,
            weight_grams: 200,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
