use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

/// Deletes the cart lines belonging to `user_id` for exactly the given products. Returns the number of rows removed.
pub async fn remove_lines(user_id: i64, product_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM cart_items WHERE user_id = ");
    builder.push_bind(user_id);
    builder.push(" AND product_id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    trace!("🗃️ Removed {} cart lines for user {user_id}", result.rows_affected());
    Ok(result.rows_affected())
}
