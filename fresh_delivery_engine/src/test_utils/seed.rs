//! The catalog, cart and address book belong to other subsystems. These functions write just enough of them for the
//! order engine to be exercised.
use sqlx::SqlitePool;

use crate::db_types::Money;

/// Inserts a product and returns its id.
pub async fn insert_product(pool: &SqlitePool, name: &str, price: Money, stock: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO products (name, price, stock) VALUES ($1, $2, $3) RETURNING id")
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(pool)
        .await
        .expect("Error inserting product")
}

/// Inserts an address for `user_id` and returns its id.
pub async fn insert_address(pool: &SqlitePool, user_id: i64, receiver_name: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO addresses (user_id, receiver_name, receiver_phone, province, city, district, detail_address)
        VALUES ($1, $2, '13800000000', 'Zhejiang', 'Hangzhou', 'Xihu', '18 Wensan Road') RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(receiver_name)
    .fetch_one(pool)
    .await
    .expect("Error inserting address")
}

pub async fn soft_delete_address(pool: &SqlitePool, address_id: i64) {
    sqlx::query("UPDATE addresses SET is_deleted = 1 WHERE id = $1")
        .bind(address_id)
        .execute(pool)
        .await
        .expect("Error deleting address");
}

pub async fn add_to_cart(pool: &SqlitePool, user_id: i64, product_id: i64, quantity: i64) {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await
        .expect("Error adding cart line");
}

pub async fn cart_product_ids(pool: &SqlitePool, user_id: i64) -> Vec<i64> {
    sqlx::query_scalar("SELECT product_id FROM cart_items WHERE user_id = $1 ORDER BY product_id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .expect("Error reading cart")
}

pub async fn count_orders(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await.expect("Error counting orders")
}

pub async fn count_order_items(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM order_items").fetch_one(pool).await.expect("Error counting items")
}

pub async fn product_sales(pool: &SqlitePool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT sales FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Error reading sales")
}
