//! # Payment Repository
//!
//! Payment rows and configured payment methods. A payment links to at most
//! one invoice; orphaned rows (no invoice) are legal and count as income in
//! the finance view.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::{InvoiceStatus, Payment, PaymentMethod};
use stockroom_core::Money;

use crate::error::DbResult;

pub async fn insert_payment<'e, E>(ex: E, payment: &Payment) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(
        id = %payment.id,
        invoice_id = ?payment.invoice_id,
        amount = %payment.amount,
        "recording payment"
    );

    sqlx::query(
        r#"
        INSERT INTO payments (id, invoice_id, method_id, amount, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.invoice_id)
    .bind(&payment.method_id)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(payment.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_payments_for_invoice<'e, E>(ex: E, invoice_id: &str) -> DbResult<Vec<Payment>>
where
    E: SqliteExecutor<'e>,
{
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, invoice_id, method_id, amount, status, created_at
        FROM payments
        WHERE invoice_id = ?1
        ORDER BY created_at
        "#,
    )
    .bind(invoice_id)
    .fetch_all(ex)
    .await?;

    Ok(payments)
}

// =============================================================================
// Payment methods
// =============================================================================

pub async fn insert_method<'e, E>(ex: E, method: &PaymentMethod) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO payment_methods (id, code, name, is_active)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&method.id)
    .bind(&method.code)
    .bind(&method.name)
    .bind(method.is_active)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn method_by_id<'e, E>(ex: E, id: &str) -> DbResult<Option<PaymentMethod>>
where
    E: SqliteExecutor<'e>,
{
    let method = sqlx::query_as::<_, PaymentMethod>(
        "SELECT id, code, name, is_active FROM payment_methods WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(method)
}

pub async fn method_by_code<'e, E>(ex: E, code: &str) -> DbResult<Option<PaymentMethod>>
where
    E: SqliteExecutor<'e>,
{
    let method = sqlx::query_as::<_, PaymentMethod>(
        "SELECT id, code, name, is_active FROM payment_methods WHERE code = ?1",
    )
    .bind(code)
    .fetch_optional(ex)
    .await?;

    Ok(method)
}

// =============================================================================
// Finance reads
// =============================================================================

/// A completed payment joined with its method code and (optional) parent
/// invoice status, for the finance snapshot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentIncomeRow {
    pub id: String,
    pub amount: Money,
    pub method_code: String,
    pub invoice_status: Option<InvoiceStatus>,
    pub created_at: DateTime<Utc>,
}

/// Completed payments in an optional date range, with method code and parent
/// invoice status attached. The finance view decides which rows count as
/// income (paid/settled invoices or orphans).
pub async fn completed_payments_in_range<'e, E>(
    ex: E,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> DbResult<Vec<PaymentIncomeRow>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PaymentIncomeRow>(
        r#"
        SELECT
            pay.id          AS id,
            pay.amount      AS amount,
            pm.code         AS method_code,
            inv.status      AS invoice_status,
            pay.created_at  AS created_at
        FROM payments pay
        INNER JOIN payment_methods pm ON pm.id = pay.method_id
        LEFT JOIN invoices inv ON inv.id = pay.invoice_id
        WHERE pay.status = 'completed'
          AND (?1 IS NULL OR pay.created_at >= ?1)
          AND (?2 IS NULL OR pay.created_at <= ?2)
        ORDER BY pay.created_at
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(ex)
    .await?;

    Ok(rows)
}

/// Method code of the most recent completed payment on an invoice, used by
/// finance to infer a refund bucket when a return has no `refund_method`.
pub async fn latest_method_code_for_invoice<'e, E>(
    ex: E,
    invoice_id: &str,
) -> DbResult<Option<String>>
where
    E: SqliteExecutor<'e>,
{
    let code: Option<String> = sqlx::query_scalar(
        r#"
        SELECT pm.code
        FROM payments pay
        INNER JOIN payment_methods pm ON pm.id = pay.method_id
        WHERE pay.invoice_id = ?1 AND pay.status = 'completed'
        ORDER BY pay.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(ex)
    .await?;

    Ok(code)
}
