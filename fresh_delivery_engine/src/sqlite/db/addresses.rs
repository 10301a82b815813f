use sqlx::SqliteConnection;

use crate::db_types::Address;

pub async fn fetch_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    let address = sqlx::query_as(
        r#"
        SELECT id, user_id, receiver_name, receiver_phone, province, city, district, detail_address, is_deleted
        FROM addresses WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(address)
}
