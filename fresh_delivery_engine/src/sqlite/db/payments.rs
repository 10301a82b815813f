use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, NewPaymentRecord, PaymentRecord, PaymentRecordStatus},
    traits::OrderGatewayError,
};

pub async fn insert_record(
    record: NewPaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, OrderGatewayError> {
    let now = Utc::now();
    let confirmed_at = (record.status == PaymentRecordStatus::Confirmed).then_some(now);
    let record: PaymentRecord = sqlx::query_as(
        r#"
            INSERT INTO payment_records (
                order_id,
                order_no,
                method,
                status,
                expected_amount,
                actual_amount,
                created_at,
                updated_at,
                confirmed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(record.order_id)
    .bind(record.order_no)
    .bind(record.method)
    .bind(record.status)
    .bind(record.expected_amount)
    .bind(record.actual_amount)
    .bind(now)
    .bind(confirmed_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {} payment record #{} created for order {}", record.status, record.id, record.order_no);
    Ok(record)
}

pub async fn fetch_record_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let record =
        sqlx::query_as("SELECT * FROM payment_records WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(record)
}

/// Confirms a pending record. Only pending records are touched, so a record can be confirmed at most once.
pub async fn confirm_record(
    order_id: i64,
    actual_amount: Money,
    transaction_id: Option<&str>,
    collector_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, OrderGatewayError> {
    let now = Utc::now();
    let record: Option<PaymentRecord> = sqlx::query_as(
        r#"
            UPDATE payment_records SET
                status = 'confirmed',
                actual_amount = $1,
                transaction_id = COALESCE($2, transaction_id),
                collector_id = COALESCE($3, collector_id),
                confirmed_at = $4,
                updated_at = $4
            WHERE order_id = $5 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(actual_amount)
    .bind(transaction_id)
    .bind(collector_id)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    record.ok_or(OrderGatewayError::PaymentRecordNotFound(order_id))
}

/// Marks the order's pending record (if any) as cancelled. Confirmed records are left untouched.
pub async fn cancel_pending_record(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payment_records SET status = 'cancelled', updated_at = $1 WHERE order_id = $2 AND status = 'pending'",
    )
    .bind(Utc::now())
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
