//! # Stock Ledger
//!
//! Atomic operations over per-(location, variant) stock rows. Every engine
//! that touches stock routes through this module exclusively — there are no
//! back-door updates to `stock_items`.
//!
//! ## Reservation vs. Deduction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Stock Movements                                    │
//! │                                                                         │
//! │  reserve(q)   soft hold:   reserved += q      (POS invoice created)    │
//! │  release(q)   undo hold:   reserved -= q      (invoice cancelled)      │
//! │  deduct(q)    settle hold: quantity -= q,     (invoice completed)      │
//! │                            reserved -= q                               │
//! │  deduct_available(q)       quantity -= q      (order created; holds    │
//! │                                                stay untouched)         │
//! │  add(q)       restock:     quantity += q      (return / cancellation)  │
//! │                                                                         │
//! │  available = quantity - reserved_quantity                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Oversell Defence
//! `reserve`, `deduct` and `deduct_available` are single conditional updates
//! (`WHERE quantity - reserved_quantity >= ?` / `WHERE quantity >= ?`), so
//! under concurrent writers the DATABASE is the authority that prevents a
//! row going negative: the loser of the race simply affects zero rows, and
//! we re-read and report the current availability. First committer wins;
//! there is no global ordering across transactions.
//!
//! ## Calling Convention
//! Every operation takes `&mut SqliteConnection` (or a plain executor for
//! reads), so the same function runs standalone or inside an ambient
//! transaction owned by a calling engine. One convention, no optional
//! transaction parameter.

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor};
use tracing::{debug, warn};
use uuid::Uuid;

use stockroom_core::types::StockItem;
use stockroom_core::CoreError;

use crate::error::{DbError, LedgerError, LedgerResult};

/// Units still promisable for a (variant, location): `quantity − reserved`.
/// Returns 0 when no stock row exists yet.
pub async fn available<'e, E>(ex: E, variant_id: &str, location_id: &str) -> LedgerResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let available: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT quantity - reserved_quantity
        FROM stock_items
        WHERE variant_id = ?1 AND location_id = ?2
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .fetch_optional(ex)
    .await
    .map_err(DbError::from)?;

    Ok(available.unwrap_or(0))
}

/// Fetches the full stock row, if it exists.
pub async fn stock_item<'e, E>(
    ex: E,
    variant_id: &str,
    location_id: &str,
) -> LedgerResult<Option<StockItem>>
where
    E: SqliteExecutor<'e>,
{
    let item = sqlx::query_as::<_, StockItem>(
        r#"
        SELECT id, location_id, variant_id, quantity, reserved_quantity,
               min_stock_level, created_at, updated_at
        FROM stock_items
        WHERE variant_id = ?1 AND location_id = ?2
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .fetch_optional(ex)
    .await
    .map_err(DbError::from)?;

    Ok(item)
}

/// Soft-holds `qty` units for a pending invoice.
///
/// Atomic compare-and-reserve: the availability check and the increment are
/// one conditional statement, so two interleaved reservations can never both
/// succeed against the same available pool.
///
/// ## Errors
/// `InsufficientStock` when `available < qty` (or no stock row exists).
pub async fn reserve(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE stock_items
        SET reserved_quantity = reserved_quantity + ?3,
            updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
          AND quantity - reserved_quantity >= ?3
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        let current = available(&mut *conn, variant_id, location_id).await?;
        return Err(insufficient(variant_id, location_id, current, qty));
    }

    debug!(variant_id, location_id, qty, "reserved stock");
    Ok(())
}

/// Releases a soft hold: `reserved = max(0, reserved − qty)`.
///
/// Releasing against a missing row is a no-op (nothing was held).
pub async fn release(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE stock_items
        SET reserved_quantity = MAX(0, reserved_quantity - ?3),
            updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    debug!(variant_id, location_id, qty, "released reservation");
    Ok(())
}

/// Physically removes stock: `quantity −= qty`, and any matching reservation
/// is consumed (`reserved = max(0, reserved − qty)`).
///
/// Single conditional update guarded by `WHERE quantity >= qty`; under
/// concurrent deductions the database, not application logic, prevents the
/// row going negative. On a zero-row update the current availability is
/// re-read and reported in the error.
pub async fn deduct(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE stock_items
        SET quantity = quantity - ?3,
            reserved_quantity = MAX(0, reserved_quantity - ?3),
            updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
          AND quantity >= ?3
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        let current = available(&mut *conn, variant_id, location_id).await?;
        return Err(insufficient(variant_id, location_id, current, qty));
    }

    debug!(variant_id, location_id, qty, "deducted stock");
    Ok(())
}

/// Physically removes unreserved stock: `quantity −= qty`, with every soft
/// hold left intact.
///
/// This is the no-reservation path (online orders deduct at creation).
/// Guarded by `WHERE quantity - reserved_quantity >= qty` like [`reserve`],
/// so a caller can never consume units already held for a pending invoice.
///
/// ## Errors
/// `InsufficientStock` when `available < qty` (or no stock row exists).
pub async fn deduct_available(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE stock_items
        SET quantity = quantity - ?3,
            updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
          AND quantity - reserved_quantity >= ?3
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        let current = available(&mut *conn, variant_id, location_id).await?;
        return Err(insufficient(variant_id, location_id, current, qty));
    }

    debug!(variant_id, location_id, qty, "deducted unreserved stock");
    Ok(())
}

/// Adds physical stock, creating the row `(quantity=qty, reserved=0)` on
/// first movement.
///
/// Row creation tolerates the unique-constraint race of two concurrent
/// "first ever" additions for the same (location, variant): on conflict the
/// increment is retried exactly once. The race is recovered locally and
/// never surfaced to callers.
pub async fn add(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<()> {
    if try_increment(&mut *conn, variant_id, location_id, qty).await? {
        debug!(variant_id, location_id, qty, "added stock");
        return Ok(());
    }

    // No row yet: first stock movement for this (location, variant).
    match insert_row(&mut *conn, variant_id, location_id, qty).await {
        Ok(()) => {
            debug!(variant_id, location_id, qty, "created stock row");
            Ok(())
        }
        Err(DbError::UniqueViolation { .. }) => {
            warn!(
                variant_id,
                location_id, "stock row created concurrently; retrying increment once"
            );
            if try_increment(&mut *conn, variant_id, location_id, qty).await? {
                Ok(())
            } else {
                // The row existed a moment ago; only a concurrent delete
                // (variant cascade) can land us here.
                Err(CoreError::ConcurrencyConflict {
                    variant_id: variant_id.to_string(),
                    location_id: location_id.to_string(),
                }
                .into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

async fn try_increment(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> LedgerResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE stock_items
        SET quantity = quantity + ?3,
            updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    Ok(result.rows_affected() > 0)
}

async fn insert_row(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    qty: i64,
) -> Result<(), DbError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO stock_items (
            id, location_id, variant_id,
            quantity, reserved_quantity, min_stock_level,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)
        "#,
    )
    .bind(&id)
    .bind(location_id)
    .bind(variant_id)
    .bind(qty)
    .bind(now)
    .execute(conn)
    .await
    .map_err(DbError::from)?;

    Ok(())
}

/// Sets the reorder threshold for a stock row.
pub async fn set_min_stock_level(
    conn: &mut SqliteConnection,
    variant_id: &str,
    location_id: &str,
    level: i64,
) -> LedgerResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE stock_items
        SET min_stock_level = ?3, updated_at = ?4
        WHERE variant_id = ?1 AND location_id = ?2
        "#,
    )
    .bind(variant_id)
    .bind(location_id)
    .bind(level)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::Db(DbError::not_found(
            "StockItem",
            format!("{variant_id}@{location_id}"),
        )));
    }

    Ok(())
}

/// Stock rows at or below their reorder threshold for a location.
pub async fn low_stock<'e, E>(ex: E, location_id: &str) -> LedgerResult<Vec<StockItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, StockItem>(
        r#"
        SELECT id, location_id, variant_id, quantity, reserved_quantity,
               min_stock_level, created_at, updated_at
        FROM stock_items
        WHERE location_id = ?1 AND quantity <= min_stock_level
        ORDER BY quantity
        "#,
    )
    .bind(location_id)
    .fetch_all(ex)
    .await
    .map_err(DbError::from)?;

    Ok(items)
}

fn insufficient(variant_id: &str, location_id: &str, available: i64, requested: i64) -> LedgerError {
    CoreError::InsufficientStock {
        variant_id: variant_id.to_string(),
        location_id: location_id.to_string(),
        available,
        requested,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_minimal_catalog, test_db};

    #[tokio::test]
    async fn available_is_zero_without_a_row() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let avail = available(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap();
        assert_eq!(avail, 0);
    }

    #[tokio::test]
    async fn add_creates_row_then_increments() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        add(&mut conn, &ids.variant_id, &ids.location_id, 7)
            .await
            .unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 10);
        assert_eq!(item.reserved_quantity, 0);
    }

    #[tokio::test]
    async fn reserve_full_pool_then_one_more_fails() {
        // quantity=10: reserve(10) ok, reserve(1) rejected.
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 10)
            .await
            .unwrap();

        reserve(&mut conn, &ids.variant_id, &ids.location_id, 10)
            .await
            .unwrap();
        assert_eq!(
            available(&mut *conn, &ids.variant_id, &ids.location_id)
                .await
                .unwrap(),
            0
        );

        let err = reserve(&mut conn, &ids.variant_id, &ids.location_id, 1)
            .await
            .unwrap_err();
        match err {
            LedgerError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 0);
                assert_eq!(requested, 1);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }
    }

    #[tokio::test]
    async fn reserve_then_release_round_trips() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap();

        reserve(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();
        release(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_quantity, 0);
        assert_eq!(item.quantity, 5);
    }

    #[tokio::test]
    async fn deduct_then_add_round_trips() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 8)
            .await
            .unwrap();

        deduct(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 8);
    }

    #[tokio::test]
    async fn deduct_consumes_reservation() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 10)
            .await
            .unwrap();
        reserve(&mut conn, &ids.variant_id, &ids.location_id, 4)
            .await
            .unwrap();

        deduct(&mut conn, &ids.variant_id, &ids.location_id, 4)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 6);
        assert_eq!(item.reserved_quantity, 0);
    }

    #[tokio::test]
    async fn deduct_available_never_touches_reservations() {
        // quantity=5 with 3 reserved: only 2 units are consumable without
        // a hold, and the hold itself must survive either outcome.
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap();
        reserve(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();

        let err = deduct_available(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap_err();
        match err {
            LedgerError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }

        deduct_available(&mut conn, &ids.variant_id, &ids.location_id, 2)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.reserved_quantity, 3);
    }

    #[tokio::test]
    async fn deduct_reports_current_availability_on_failure() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();

        let err = deduct(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap_err();
        match err {
            LedgerError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }
    }

    #[tokio::test]
    async fn release_never_goes_negative() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 5)
            .await
            .unwrap();
        reserve(&mut conn, &ids.variant_id, &ids.location_id, 2)
            .await
            .unwrap();

        // Over-release clamps at zero
        release(&mut conn, &ids.variant_id, &ids.location_id, 10)
            .await
            .unwrap();

        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_quantity, 0);
    }

    #[tokio::test]
    async fn concurrent_deducts_never_oversell() {
        // N workers race a finite pool; total successes ≤ initial quantity
        // and the row never goes negative.
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            add(&mut conn, &ids.variant_id, &ids.location_id, 10)
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..25 {
            let db = db.clone();
            let variant_id = ids.variant_id.clone();
            let location_id = ids.location_id.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = db.pool().acquire().await.unwrap();
                deduct(&mut conn, &variant_id, &location_id, 1).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 10);

        let mut conn = db.pool().acquire().await.unwrap();
        let item = stock_item(&mut *conn, &ids.variant_id, &ids.location_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 0);
    }

    #[tokio::test]
    async fn low_stock_lists_rows_at_threshold() {
        let db = test_db().await;
        let ids = seed_minimal_catalog(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        add(&mut conn, &ids.variant_id, &ids.location_id, 2)
            .await
            .unwrap();
        set_min_stock_level(&mut conn, &ids.variant_id, &ids.location_id, 3)
            .await
            .unwrap();

        let low = low_stock(&mut *conn, &ids.location_id).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].variant_id, ids.variant_id);
    }
}
