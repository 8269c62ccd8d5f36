//! Expense rows. Finance subtracts the period's expenses from net income.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use stockroom_core::types::Expense;

use crate::error::DbResult;

pub async fn insert_expense<'e, E>(ex: E, expense: &Expense) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO expenses (id, description, amount, incurred_at, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&expense.id)
    .bind(&expense.description)
    .bind(expense.amount)
    .bind(expense.incurred_at)
    .bind(expense.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn expenses_in_range<'e, E>(
    ex: E,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> DbResult<Vec<Expense>>
where
    E: SqliteExecutor<'e>,
{
    let expenses = sqlx::query_as::<_, Expense>(
        r#"
        SELECT id, description, amount, incurred_at, created_at
        FROM expenses
        WHERE (?1 IS NULL OR incurred_at >= ?1)
          AND (?2 IS NULL OR incurred_at <= ?2)
        ORDER BY incurred_at
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(ex)
    .await?;

    Ok(expenses)
}
