use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewOrderItem, OrderItem};

pub async fn insert_items(
    order_id: i64,
    items: Vec<NewOrderItem>,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let row: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (
                order_id,
                product_id,
                product_name,
                product_image,
                unit_price,
                quantity,
                subtotal,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.product_name)
        .bind(item.product_image)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.subtotal)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;
        result.push(row);
    }
    Ok(result)
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}
