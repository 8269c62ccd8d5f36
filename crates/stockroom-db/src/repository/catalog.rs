//! # Catalog Repository
//!
//! Read/write access to locations, products, variants and employees. The
//! engines only READ the catalog (to snapshot prices at transaction time);
//! the write functions exist for bootstrap, seeding and admin surfaces.
//!
//! ## Price Resolution
//! A variant may override either price; `variant_pricing` resolves
//! `COALESCE(variant override, product price)` in one query so snapshots
//! always reflect the product-level price when the override is null.

use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::{Employee, Location, Product, Variant, VariantPricing};

use crate::error::DbResult;

// =============================================================================
// Locations
// =============================================================================

pub async fn insert_location<'e, E>(ex: E, location: &Location) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(id = %location.id, name = %location.name, "inserting location");

    sqlx::query(
        r#"
        INSERT INTO locations (id, name, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&location.id)
    .bind(&location.name)
    .bind(location.is_active)
    .bind(location.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_location<'e, E>(ex: E, id: &str) -> DbResult<Option<Location>>
where
    E: SqliteExecutor<'e>,
{
    let location = sqlx::query_as::<_, Location>(
        "SELECT id, name, is_active, created_at FROM locations WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(location)
}

/// Picks the default fulfillment location for online orders: prefers an
/// active location whose name contains "store" or "main", else the first
/// active location by creation time.
pub async fn default_fulfillment_location<'e, E>(ex: E) -> DbResult<Option<Location>>
where
    E: SqliteExecutor<'e>,
{
    let location = sqlx::query_as::<_, Location>(
        r#"
        SELECT id, name, is_active, created_at
        FROM locations
        WHERE is_active = 1
        ORDER BY
            CASE
                WHEN LOWER(name) LIKE '%store%' OR LOWER(name) LIKE '%main%' THEN 0
                ELSE 1
            END,
            created_at
        LIMIT 1
        "#,
    )
    .fetch_optional(ex)
    .await?;

    Ok(location)
}

// =============================================================================
// Products & Variants
// =============================================================================

pub async fn insert_product<'e, E>(ex: E, product: &Product) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(id = %product.id, name = %product.name, "inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (id, name, cost_price, retail_price, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.cost_price)
    .bind(product.retail_price)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn insert_variant<'e, E>(ex: E, variant: &Variant) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(id = %variant.id, sku = %variant.sku, "inserting variant");

    sqlx::query(
        r#"
        INSERT INTO variants (
            id, product_id, sku, cost_price, retail_price,
            weight_grams, is_active, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&variant.id)
    .bind(&variant.product_id)
    .bind(&variant.sku)
    .bind(variant.cost_price)
    .bind(variant.retail_price)
    .bind(variant.weight_grams)
    .bind(variant.is_active)
    .bind(variant.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_variant<'e, E>(ex: E, id: &str) -> DbResult<Option<Variant>>
where
    E: SqliteExecutor<'e>,
{
    let variant = sqlx::query_as::<_, Variant>(
        r#"
        SELECT id, product_id, sku, cost_price, retail_price,
               weight_grams, is_active, created_at
        FROM variants
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(variant)
}

/// Resolved (cost, retail) pricing for a variant: variant override falling
/// back to the product-level price. `None` when the variant is unknown.
pub async fn variant_pricing<'e, E>(ex: E, variant_id: &str) -> DbResult<Option<VariantPricing>>
where
    E: SqliteExecutor<'e>,
{
    let pricing = sqlx::query_as::<_, VariantPricing>(
        r#"
        SELECT
            COALESCE(v.cost_price, p.cost_price) AS cost_price,
            COALESCE(v.retail_price, p.retail_price) AS retail_price
        FROM variants v
        INNER JOIN products p ON p.id = v.product_id
        WHERE v.id = ?1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(ex)
    .await?;

    Ok(pricing)
}

// =============================================================================
// Employees
// =============================================================================

pub async fn insert_employee<'e, E>(ex: E, employee: &Employee) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO employees (id, name, commission_rate_bps, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&employee.id)
    .bind(&employee.name)
    .bind(employee.commission_rate_bps)
    .bind(employee.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_employee<'e, E>(ex: E, id: &str) -> DbResult<Option<Employee>>
where
    E: SqliteExecutor<'e>,
{
    let employee = sqlx::query_as::<_, Employee>(
        "SELECT id, name, commission_rate_bps, created_at FROM employees WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(employee)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_db, variant_row};
    use chrono::Utc;
    use stockroom_core::Money;
    use uuid::Uuid;

    #[tokio::test]
    async fn pricing_falls_back_to_product_prices() {
        let db = test_db().await;
        let now = Utc::now();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Plain Tee".into(),
            cost_price: "60".parse().unwrap(),
            retail_price: "100".parse().unwrap(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        insert_product(db.pool(), &product).await.unwrap();

        // No overrides: product prices apply
        let plain = variant_row(&product.id, "TEE-S", None, None);
        insert_variant(db.pool(), &plain).await.unwrap();

        let pricing = variant_pricing(db.pool(), &plain.id).await.unwrap().unwrap();
        assert_eq!(pricing.cost_price, Money::from_major(60));
        assert_eq!(pricing.retail_price, Money::from_major(100));

        // Retail override only: cost still falls back
        let premium = variant_row(&product.id, "TEE-XL", None, Some("120".parse().unwrap()));
        insert_variant(db.pool(), &premium).await.unwrap();

        let pricing = variant_pricing(db.pool(), &premium.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pricing.cost_price, Money::from_major(60));
        assert_eq!(pricing.retail_price, Money::from_major(120));
    }

    #[tokio::test]
    async fn unknown_variant_has_no_pricing() {
        let db = test_db().await;
        assert!(variant_pricing(db.pool(), "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn default_location_prefers_store_or_main() {
        let db = test_db().await;
        let earlier = Utc::now() - chrono::Duration::hours(1);
        let later = Utc::now();

        let warehouse = Location {
            id: Uuid::new_v4().to_string(),
            name: "North Warehouse".into(),
            is_active: true,
            created_at: earlier,
        };
        let store = Location {
            id: Uuid::new_v4().to_string(),
            name: "Main Store".into(),
            is_active: true,
            created_at: later,
        };
        insert_location(db.pool(), &warehouse).await.unwrap();
        insert_location(db.pool(), &store).await.unwrap();

        let picked = default_fulfillment_location(db.pool())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, store.id);
    }

    #[tokio::test]
    async fn default_location_falls_back_to_first_active() {
        let db = test_db().await;
        let loc = Location {
            id: Uuid::new_v4().to_string(),
            name: "Depot 7".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        insert_location(db.pool(), &loc).await.unwrap();

        let picked = default_fulfillment_location(db.pool())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, loc.id);
    }
}
