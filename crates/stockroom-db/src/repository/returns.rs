//! # Returns Repository
//!
//! Rows for returns and return lines. The tagged target/source enums are
//! stored as (kind, id) column pairs; the core's manual `FromRow` impls
//! rebuild them on read.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::{ReturnItem, ReturnLineSource, ReturnRecord};

use crate::error::DbResult;

pub async fn insert_return<'e, E>(ex: E, record: &ReturnRecord) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(
        id = %record.id,
        target_kind = record.target.kind(),
        target_id = record.target.id(),
        refund_total = %record.refund_total,
        "inserting return"
    );

    sqlx::query(
        r#"
        INSERT INTO returns (
            id, target_kind, target_id, reason,
            refund_method, refund_total, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&record.id)
    .bind(record.target.kind())
    .bind(record.target.id())
    .bind(&record.reason)
    .bind(&record.refund_method)
    .bind(record.refund_total)
    .bind(record.status)
    .bind(record.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn insert_return_item<'e, E>(ex: E, item: &ReturnItem) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO return_items (
            id, return_id, source_kind, source_id,
            quantity, refund_amount, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.return_id)
    .bind(item.source.kind())
    .bind(item.source.id())
    .bind(item.quantity)
    .bind(item.refund_amount)
    .bind(item.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_return<'e, E>(ex: E, id: &str) -> DbResult<Option<ReturnRecord>>
where
    E: SqliteExecutor<'e>,
{
    let record = sqlx::query_as::<_, ReturnRecord>(
        r#"
        SELECT id, target_kind, target_id, reason,
               refund_method, refund_total, status, created_at
        FROM returns
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(record)
}

pub async fn get_return_items<'e, E>(ex: E, return_id: &str) -> DbResult<Vec<ReturnItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, ReturnItem>(
        r#"
        SELECT id, return_id, source_kind, source_id,
               quantity, refund_amount, created_at
        FROM return_items
        WHERE return_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(return_id)
    .fetch_all(ex)
    .await?;

    Ok(items)
}

/// Units already returned against one original line, across all returns that
/// still count (rejected/cancelled returns are excluded). The over-return
/// guard compares this against the original line quantity.
pub async fn returned_quantity_for_source<'e, E>(
    ex: E,
    source: &ReturnLineSource,
) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    // Integer SUM is exact in SQLite; money sums stay in application code.
    let total: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT SUM(ri.quantity)
        FROM return_items ri
        INNER JOIN returns r ON r.id = ri.return_id
        WHERE ri.source_kind = ?1
          AND ri.source_id = ?2
          AND r.status NOT IN ('rejected', 'cancelled')
        "#,
    )
    .bind(source.kind())
    .bind(source.id())
    .fetch_one(ex)
    .await?;

    Ok(total.unwrap_or(0))
}

/// All counting returns filed against one parent, for the rollup step.
pub async fn returns_for_target<'e, E>(
    ex: E,
    target_kind: &str,
    target_id: &str,
) -> DbResult<Vec<ReturnRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, ReturnRecord>(
        r#"
        SELECT id, target_kind, target_id, reason,
               refund_method, refund_total, status, created_at
        FROM returns
        WHERE target_kind = ?1
          AND target_id = ?2
          AND status NOT IN ('rejected', 'cancelled')
        ORDER BY created_at
        "#,
    )
    .bind(target_kind)
    .bind(target_id)
    .fetch_all(ex)
    .await?;

    Ok(records)
}

/// Counting returns in an optional date range, for the finance snapshot's
/// refund buckets.
pub async fn returns_in_range<'e, E>(
    ex: E,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> DbResult<Vec<ReturnRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, ReturnRecord>(
        r#"
        SELECT id, target_kind, target_id, reason,
               refund_method, refund_total, status, created_at
        FROM returns
        WHERE status NOT IN ('rejected', 'cancelled')
          AND (?1 IS NULL OR created_at >= ?1)
          AND (?2 IS NULL OR created_at <= ?2)
        ORDER BY created_at
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(ex)
    .await?;

    Ok(records)
}
