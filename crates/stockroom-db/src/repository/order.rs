//! # Order Repository
//!
//! Persistence for online-order headers and line items. Stock for an order
//! is deducted at creation by the fulfillment engine; status transitions
//! after that are persisted here without stock side-effects.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::{Order, OrderItem, OrderPaymentStatus, OrderStatus};

use crate::error::{DbError, DbResult};

pub async fn insert_order<'e, E>(ex: E, order: &Order) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(id = %order.id, user_id = %order.user_id, total = %order.total, "inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, location_id, delivery_address_id, payment_method,
            status, payment_status, subtotal, shipping_fee, total,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.location_id)
    .bind(&order.delivery_address_id)
    .bind(&order.payment_method)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.total)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn insert_order_item<'e, E>(ex: E, item: &OrderItem) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, variant_id, quantity,
            unit_price, cost_price, line_total, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.variant_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.cost_price)
    .bind(item.line_total)
    .bind(item.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_order<'e, E>(ex: E, id: &str) -> DbResult<Option<Order>>
where
    E: SqliteExecutor<'e>,
{
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, location_id, delivery_address_id, payment_method,
               status, payment_status, subtotal, shipping_fee, total,
               created_at, updated_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(order)
}

pub async fn get_order_items<'e, E>(ex: E, order_id: &str) -> DbResult<Vec<OrderItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, variant_id, quantity,
               unit_price, cost_price, line_total, created_at
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(ex)
    .await?;

    Ok(items)
}

pub async fn get_order_item<'e, E>(ex: E, id: &str) -> DbResult<Option<OrderItem>>
where
    E: SqliteExecutor<'e>,
{
    let item = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, variant_id, quantity,
               unit_price, cost_price, line_total, created_at
        FROM order_items
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(item)
}

/// Persists a fulfillment status transition (no stock side-effects).
pub async fn set_status<'e, E>(ex: E, id: &str, status: OrderStatus) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();

    let result = sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(ex)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", id));
    }

    Ok(())
}

/// Writes the returns rollup: fulfillment status and payment status together.
pub async fn set_return_rollup<'e, E>(
    ex: E,
    id: &str,
    status: OrderStatus,
    payment_status: OrderPaymentStatus,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?2, payment_status = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(payment_status)
    .bind(now)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", id));
    }

    Ok(())
}

/// Orders still in flight (pending/confirmed/processing/shipped) whose
/// payment status shows no Payment rows yet — the finance view counts their
/// `total − shipping_fee` as expected income without double-counting.
pub async fn in_flight_orders_in_range<'e, E>(
    ex: E,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> DbResult<Vec<Order>>
where
    E: SqliteExecutor<'e>,
{
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, location_id, delivery_address_id, payment_method,
               status, payment_status, subtotal, shipping_fee, total,
               created_at, updated_at
        FROM orders
        WHERE status IN ('pending', 'confirmed', 'processing', 'shipped')
          AND payment_status NOT IN ('paid', 'partially_paid', 'refunded')
          AND (?1 IS NULL OR created_at >= ?1)
          AND (?2 IS NULL OR created_at <= ?2)
        ORDER BY created_at
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(ex)
    .await?;

    Ok(orders)
}
