use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::traits::{OrderGatewayError, StockLine};

pub async fn fetch_stock(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let stock = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(stock)
}

/// Compare-and-decrement. Nothing is written unless the full quantity is available.
pub async fn deduct_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, OrderGatewayError> {
    if quantity <= 0 {
        return Err(OrderGatewayError::InvalidQuantity(quantity));
    }
    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE products SET stock = stock - $1, updated_at = $2 WHERE id = $3 AND stock >= $1 RETURNING stock",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match remaining {
        Some(stock) => {
            trace!("🗃️ Deducted {quantity} of product {product_id}. {stock} left");
            Ok(stock)
        },
        None => match fetch_stock(product_id, conn).await? {
            Some(available) => {
                Err(OrderGatewayError::InsufficientStock { product_id, requested: quantity, available })
            },
            None => Err(OrderGatewayError::ProductNotFound(product_id)),
        },
    }
}

/// Deducts each line in turn. The first failure is returned as-is; earlier deductions are only undone if the caller
/// rolls back the surrounding transaction.
pub async fn batch_deduct(lines: &[StockLine], conn: &mut SqliteConnection) -> Result<(), OrderGatewayError> {
    for line in lines {
        deduct_stock(line.product_id, line.quantity, conn).await?;
    }
    Ok(())
}

pub async fn restock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<i64, OrderGatewayError> {
    if quantity <= 0 {
        return Err(OrderGatewayError::InvalidQuantity(quantity));
    }
    let stock: Option<i64> =
        sqlx::query_scalar("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3 RETURNING stock")
            .bind(quantity)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    stock.ok_or(OrderGatewayError::ProductNotFound(product_id))
}

pub async fn add_sales(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET sales = sales + $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
