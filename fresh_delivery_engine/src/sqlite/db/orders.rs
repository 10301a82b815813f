use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Money, NewOrder, Order, OrderNo, OrderStatusType, PayStatus},
    order_objects::{OrderQueryFilter, OrderStats, Paging},
    traits::OrderGatewayError,
};

/// Inserts a new order with status `awaiting_payment` and payment status `unpaid`. This is not atomic on its own; embed
/// the call in a transaction and pass `&mut *tx` as the connection when the items and stock must go in with it.
///
/// A clash on the order number is reported as [`OrderGatewayError::DuplicateOrderNumber`].
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderGatewayError> {
    let order_no = order.order_no.clone();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_no,
                user_id,
                subtotal,
                delivery_fee,
                total_amount,
                payment_method,
                pay_status,
                status,
                delivery_type,
                receiver_name,
                receiver_phone,
                receiver_address,
                remark,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(order.order_no)
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .bind(PayStatus::Unpaid)
    .bind(OrderStatusType::AwaitingPayment)
    .bind(order.delivery_type)
    .bind(order.receiver_name)
    .bind(order.receiver_phone)
    .bind(order.receiver_address)
    .bind(order.remark)
    .bind(order.created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderGatewayError::DuplicateOrderNumber(order_no),
        _ => OrderGatewayError::from(e),
    })?;
    debug!("🗃️ Order {} inserted with id {}", order.order_no, order.id);
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_order_no(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_no = $1")
        .bind(order_no.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// The columns a status transition may touch besides `status` and `updated_at`. `None` leaves a column as it is.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub pay_status: Option<PayStatus>,
    pub pay_amount: Option<Money>,
    pub cancel_reason: Option<String>,
    pub refund_reason: Option<String>,
    pub shipping_company: Option<String>,
    pub tracking_no: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrderChanges {
    pub fn paid(amount: Money, at: DateTime<Utc>) -> Self {
        Self { pay_status: Some(PayStatus::Paid), pay_amount: Some(amount), paid_at: Some(at), ..Default::default() }
    }

    pub fn shipped(company: &str, tracking_no: &str, at: DateTime<Utc>) -> Self {
        Self {
            shipping_company: Some(company.to_string()),
            tracking_no: Some(tracking_no.to_string()),
            shipped_at: Some(at),
            ..Default::default()
        }
    }

    pub fn finished(at: DateTime<Utc>) -> Self {
        Self { confirmed_at: Some(at), finished_at: Some(at), ..Default::default() }
    }

    pub fn cancelled(reason: &str, at: DateTime<Utc>) -> Self {
        Self { cancel_reason: Some(reason.to_string()), cancelled_at: Some(at), ..Default::default() }
    }

    /// A refund closes the order. It is not a cancellation, so `cancelled_at` and `cancel_reason` stay untouched.
    pub fn refunded(reason: &str, at: DateTime<Utc>) -> Self {
        Self { refund_reason: Some(reason.to_string()), finished_at: Some(at), ..Default::default() }
    }

    /// Merges `other` into `self`; fields set in `other` win.
    pub fn and(self, other: OrderChanges) -> Self {
        Self {
            pay_status: other.pay_status.or(self.pay_status),
            pay_amount: other.pay_amount.or(self.pay_amount),
            cancel_reason: other.cancel_reason.or(self.cancel_reason),
            refund_reason: other.refund_reason.or(self.refund_reason),
            shipping_company: other.shipping_company.or(self.shipping_company),
            tracking_no: other.tracking_no.or(self.tracking_no),
            paid_at: other.paid_at.or(self.paid_at),
            shipped_at: other.shipped_at.or(self.shipped_at),
            confirmed_at: other.confirmed_at.or(self.confirmed_at),
            cancelled_at: other.cancelled_at.or(self.cancelled_at),
            finished_at: other.finished_at.or(self.finished_at),
        }
    }
}

/// Moves `order` to `next`, applying `changes`, but only if the row is still in the status `order` was read with.
///
/// If another request got there first, no row matches and [`OrderGatewayError::ConcurrentModification`] is returned.
pub async fn update_status_guarded(
    order: &Order,
    next: OrderStatusType,
    changes: OrderChanges,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderGatewayError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET ");
    let mut set_clause = builder.separated(", ");
    set_clause.push("status = ");
    set_clause.push_bind_unseparated(next);
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    if let Some(pay_status) = changes.pay_status {
        set_clause.push("pay_status = ");
        set_clause.push_bind_unseparated(pay_status);
    }
    if let Some(amount) = changes.pay_amount {
        set_clause.push("pay_amount = ");
        set_clause.push_bind_unseparated(amount);
    }
    if let Some(reason) = changes.cancel_reason {
        set_clause.push("cancel_reason = ");
        set_clause.push_bind_unseparated(reason);
    }
    if let Some(reason) = changes.refund_reason {
        set_clause.push("refund_reason = ");
        set_clause.push_bind_unseparated(reason);
    }
    if let Some(company) = changes.shipping_company {
        set_clause.push("shipping_company = ");
        set_clause.push_bind_unseparated(company);
    }
    if let Some(tracking_no) = changes.tracking_no {
        set_clause.push("tracking_no = ");
        set_clause.push_bind_unseparated(tracking_no);
    }
    let timestamps = [
        ("paid_at = ", changes.paid_at),
        ("shipped_at = ", changes.shipped_at),
        ("confirmed_at = ", changes.confirmed_at),
        ("cancelled_at = ", changes.cancelled_at),
        ("finished_at = ", changes.finished_at),
    ];
    for (column, value) in timestamps {
        if let Some(ts) = value {
            set_clause.push(column);
            set_clause.push_bind_unseparated(ts);
        }
    }
    builder.push(" WHERE id = ");
    builder.push_bind(order.id);
    builder.push(" AND status = ");
    builder.push_bind(order.status);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let updated: Option<Order> = builder.build_query_as().fetch_optional(conn).await?;
    let updated = updated.ok_or_else(|| OrderGatewayError::ConcurrentModification(order.order_no.clone()))?;
    debug!("🗃️ Order {} moved from {} to {}", updated.order_no, order.status, updated.status);
    Ok(updated)
}

/// Escapes the `LIKE` wildcards in `fragment` so that it only ever matches literally. Pair with `ESCAPE '\'`.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_search_filter(query: &OrderQueryFilter, builder: &mut QueryBuilder<'_, Sqlite>) {
    builder.push(" WHERE is_deleted = 0");
    if let Some(fragment) = &query.order_no {
        builder.push(" AND order_no LIKE ");
        builder.push_bind(format!("%{}%", escape_like(fragment)));
        builder.push(" ESCAPE '\\'");
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let codes = statuses.iter().map(|s| s.code().to_string()).collect::<Vec<_>>().join(",");
        builder.push(format!(" AND status IN ({codes})"));
    }
    if let Some(since) = query.since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = query.until {
        builder.push(" AND created_at <= ");
        builder.push_bind(until);
    }
}

/// One page of the orders matching the `OrderQueryFilter`, newest first, and the total number of matches. Soft-deleted
/// orders are never returned.
pub async fn search_orders(
    query: OrderQueryFilter,
    paging: Paging,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders");
    push_search_filter(&query, &mut count);
    trace!("🗃️ Executing query: {}", count.sql());
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders");
    push_search_filter(&query, &mut builder);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(paging.page_size);
    builder.push(" OFFSET ");
    builder.push_bind(paging.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} of {total}", orders.len());
    Ok((orders, total))
}

/// One page of a user's orders, newest first, and the total count of orders matching the same filter.
pub async fn fetch_orders_for_user(
    user_id: i64,
    status: Option<OrderStatusType>,
    paging: Paging,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let (orders, total) = match status {
        Some(status) => {
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = $2 AND is_deleted = 0",
            )
            .bind(user_id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await?;
            let orders = sqlx::query_as(
                r#"
                SELECT * FROM orders WHERE user_id = $1 AND status = $2 AND is_deleted = 0
                ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4
                "#,
            )
            .bind(user_id)
            .bind(status)
            .bind(paging.page_size)
            .bind(paging.offset())
            .fetch_all(conn)
            .await?;
            (orders, total)
        },
        None => {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND is_deleted = 0")
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
            let orders = sqlx::query_as(
                r#"
                SELECT * FROM orders WHERE user_id = $1 AND is_deleted = 0
                ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3
                "#,
            )
            .bind(user_id)
            .bind(paging.page_size)
            .bind(paging.offset())
            .fetch_all(conn)
            .await?;
            (orders, total)
        },
    };
    Ok((orders, total))
}

pub async fn order_stats_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<OrderStats, sqlx::Error> {
    let counts: Vec<(OrderStatusType, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM orders WHERE user_id = $1 AND is_deleted = 0 GROUP BY status",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    let stats = counts.into_iter().fold(OrderStats::default(), |mut stats, (status, count)| {
        match status {
            OrderStatusType::AwaitingPayment => stats.awaiting_payment = count,
            OrderStatusType::AwaitingShipment => stats.awaiting_shipment = count,
            OrderStatusType::AwaitingReceipt => stats.awaiting_receipt = count,
            OrderStatusType::Completed => stats.completed = count,
            OrderStatusType::Cancelled | OrderStatusType::Refunded => {},
        }
        stats
    });
    Ok(stats)
}
