//! # Bootstrap
//!
//! Idempotent startup seeding. Runs after migrations and ensures the payment
//! channels the finance view buckets by always exist; `INSERT OR IGNORE`
//! keyed on the unique `code` column makes re-runs no-ops.

use sqlx::SqliteExecutor;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;

/// Default payment channels: (code, display name).
///
/// Codes are stable API; the finance view maps them to safe buckets.
const DEFAULT_PAYMENT_METHODS: &[(&str, &str)] = &[
    ("cash_pos", "Cash (POS)"),
    ("cod", "Cash on Delivery"),
    ("vodafone_cash", "Vodafone Cash"),
    ("instapay", "InstaPay"),
    ("fawry", "Fawry"),
];

/// Seeds the default payment methods. Idempotent.
pub async fn seed_payment_methods<'e, E>(ex: E) -> DbResult<()>
where
    E: SqliteExecutor<'e> + Copy,
{
    let mut inserted = 0u32;

    for (code, name) in DEFAULT_PAYMENT_METHODS {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO payment_methods (id, code, name, is_active)
            VALUES (?1, ?2, ?3, 1)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(code)
        .bind(name)
        .execute(ex)
        .await?;

        inserted += result.rows_affected() as u32;
    }

    info!(inserted, "payment method bootstrap complete");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::payment;
    use crate::testutil::test_db;

    #[tokio::test]
    async fn seeds_all_default_methods() {
        let db = test_db().await;
        seed_payment_methods(db.pool()).await.unwrap();

        for (code, _) in DEFAULT_PAYMENT_METHODS {
            let method = payment::method_by_code(db.pool(), code).await.unwrap();
            assert!(method.is_some(), "missing method {code}");
        }
    }

    #[tokio::test]
    async fn reseeding_is_a_noop() {
        let db = test_db().await;
        seed_payment_methods(db.pool()).await.unwrap();

        let before = payment::method_by_code(db.pool(), "cash_pos")
            .await
            .unwrap()
            .unwrap();

        seed_payment_methods(db.pool()).await.unwrap();

        let after = payment::method_by_code(db.pool(), "cash_pos")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.id, after.id);
    }
}
