//! Cart rows. `create_order` reads a user's cart inside its transaction and
//! clears it on success, so a committed order always leaves an empty cart.

use sqlx::SqliteExecutor;
use tracing::debug;

use stockroom_core::types::CartItem;

use crate::error::DbResult;

pub async fn add_cart_item<'e, E>(ex: E, item: &CartItem) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, variant_id, quantity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&item.id)
    .bind(&item.user_id)
    .bind(&item.variant_id)
    .bind(item.quantity)
    .bind(item.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn cart_for_user<'e, E>(ex: E, user_id: &str) -> DbResult<Vec<CartItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, user_id, variant_id, quantity, created_at
        FROM cart_items
        WHERE user_id = ?1
        ORDER BY created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(ex)
    .await?;

    Ok(items)
}

pub async fn clear_cart<'e, E>(ex: E, user_id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
        .bind(user_id)
        .execute(ex)
        .await?;

    let cleared = result.rows_affected();
    debug!(user_id = %user_id, cleared, "cleared cart");

    Ok(cleared)
}
