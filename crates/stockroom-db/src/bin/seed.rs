//! Seed a development database with a small demo catalog.
//!
//! ```bash
//! cargo run -p stockroom-db --bin seed -- [path/to/stockroom.db]
//! ```

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use stockroom_core::types::{Employee, Location, Product, Variant};
use stockroom_core::Money;
use stockroom_db::repository::catalog;
use stockroom_db::{bootstrap, ledger, Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "stockroom.db".to_string());

    info!(path = %path, "seeding development database");

    let db = Database::new(DbConfig::new(&path)).await?;
    bootstrap::seed_payment_methods(db.pool()).await?;

    let now = Utc::now();

    let store = Location {
        id: Uuid::new_v4().to_string(),
        name: "Main Store".into(),
        is_active: true,
        created_at: now,
    };
    let warehouse = Location {
        id: Uuid::new_v4().to_string(),
        name: "North Warehouse".into(),
        is_active: true,
        created_at: now,
    };
    catalog::insert_location(db.pool(), &store).await?;
    catalog::insert_location(db.pool(), &warehouse).await?;

    let tee = Product {
        id: Uuid::new_v4().to_string(),
        name: "Basic Tee".into(),
        cost_price: Money::from_major(60),
        retail_price: Money::from_major(100),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let hoodie = Product {
        id: Uuid::new_v4().to_string(),
        name: "Zip Hoodie".into(),
        cost_price: Money::from_major(180),
        retail_price: Money::from_major(300),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    catalog::insert_product(db.pool(), &tee).await?;
    catalog::insert_product(db.pool(), &hoodie).await?;

    let variants = [
        (&tee, "TEE-S", 180),
        (&tee, "TEE-M", 200),
        (&tee, "TEE-L", 220),
        (&hoodie, "HOOD-M", 550),
        (&hoodie, "HOOD-L", 600),
    ];
    let mut conn = db.pool().acquire().await?;
    for (product, sku, weight_grams) in variants {
        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            sku: sku.to_string(),
            cost_price: None,
            retail_price: None,
            weight_grams,
            is_active: true,
            created_at: now,
        };
        catalog::insert_variant(db.pool(), &variant).await?;

        ledger::add(&mut conn, &variant.id, &store.id, 25).await?;
        ledger::add(&mut conn, &variant.id, &warehouse.id, 100).await?;
        ledger::set_min_stock_level(&mut conn, &variant.id, &store.id, 5).await?;
    }
    drop(conn);

    let cashier = Employee {
        id: Uuid::new_v4().to_string(),
        name: "Sara".into(),
        commission_rate_bps: 250,
        created_at: now,
    };
    catalog::insert_employee(db.pool(), &cashier).await?;

    info!(
        store_id = %store.id,
        warehouse_id = %warehouse.id,
        employee_id = %cashier.id,
        "demo catalog seeded"
    );

    db.close().await;
    Ok(())
}
