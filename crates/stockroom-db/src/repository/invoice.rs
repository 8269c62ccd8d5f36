//! # Invoice Repository
//!
//! Persistence for POS invoice headers, line items and commission records.
//! Lifecycle orchestration (reserve → pay → deduct → complete) lives in the
//! sales engine; this module only reads and writes rows. All mutating calls
//! are expected to run inside the engine's transaction.

use chrono::Utc;
use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::{CommissionRecord, Invoice, InvoiceItem, InvoiceStatus};
use stockroom_core::Money;

use crate::error::{DbError, DbResult};

pub async fn insert_invoice<'e, E>(ex: E, invoice: &Invoice) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(id = %invoice.id, total = %invoice.total, "inserting invoice");

    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, location_id, employee_id, status,
            subtotal, total, paid_amount, commission_amount,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.location_id)
    .bind(&invoice.employee_id)
    .bind(invoice.status)
    .bind(invoice.subtotal)
    .bind(invoice.total)
    .bind(invoice.paid_amount)
    .bind(invoice.commission_amount)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Inserts one invoice line (catalog snapshot taken by the engine).
pub async fn insert_invoice_item<'e, E>(ex: E, item: &InvoiceItem) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO invoice_items (
            id, invoice_id, variant_id, quantity,
            unit_price, cost_price, profit_margin, line_total,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.invoice_id)
    .bind(&item.variant_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.cost_price)
    .bind(item.profit_margin)
    .bind(item.line_total)
    .bind(item.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_invoice<'e, E>(ex: E, id: &str) -> DbResult<Option<Invoice>>
where
    E: SqliteExecutor<'e>,
{
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, location_id, employee_id, status,
               subtotal, total, paid_amount, commission_amount,
               created_at, updated_at
        FROM invoices
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(invoice)
}

/// Lines in input order (creation order within the invoice transaction).
pub async fn get_invoice_items<'e, E>(ex: E, invoice_id: &str) -> DbResult<Vec<InvoiceItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, variant_id, quantity,
               unit_price, cost_price, profit_margin, line_total, created_at
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(invoice_id)
    .fetch_all(ex)
    .await?;

    Ok(items)
}

pub async fn get_invoice_item<'e, E>(ex: E, id: &str) -> DbResult<Option<InvoiceItem>>
where
    E: SqliteExecutor<'e>,
{
    let item = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, variant_id, quantity,
               unit_price, cost_price, profit_margin, line_total, created_at
        FROM invoice_items
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(item)
}

pub async fn set_status<'e, E>(ex: E, id: &str, status: InvoiceStatus) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();

    let result = sqlx::query("UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(ex)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Invoice", id));
    }

    Ok(())
}

/// Writes the accumulated paid amount and resulting status in one update.
pub async fn apply_payment<'e, E>(
    ex: E,
    id: &str,
    paid_amount: Money,
    status: InvoiceStatus,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET paid_amount = ?2, status = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(paid_amount)
    .bind(status)
    .bind(now)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Invoice", id));
    }

    Ok(())
}

// =============================================================================
// Commission records
// =============================================================================

pub async fn insert_commission<'e, E>(ex: E, record: &CommissionRecord) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(invoice_id = %record.invoice_id, amount = %record.amount, "recording commission");

    sqlx::query(
        r#"
        INSERT INTO commission_records (id, invoice_id, employee_id, amount, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&record.id)
    .bind(&record.invoice_id)
    .bind(&record.employee_id)
    .bind(record.amount)
    .bind(record.status)
    .bind(record.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn commission_for_invoice<'e, E>(
    ex: E,
    invoice_id: &str,
) -> DbResult<Option<CommissionRecord>>
where
    E: SqliteExecutor<'e>,
{
    let record = sqlx::query_as::<_, CommissionRecord>(
        r#"
        SELECT id, invoice_id, employee_id, amount, status, created_at
        FROM commission_records
        WHERE invoice_id = ?1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(ex)
    .await?;

    Ok(record)
}

/// Voids any pending commission when an invoice is cancelled.
pub async fn void_commissions<'e, E>(ex: E, invoice_id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE commission_records
        SET status = 'voided'
        WHERE invoice_id = ?1 AND status = 'pending'
        "#,
    )
    .bind(invoice_id)
    .execute(ex)
    .await?;

    Ok(())
}
