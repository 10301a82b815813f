//! `SqliteDatabase` is the concrete order engine backend.
//!
//! It uses SQLite as the store and implements all the traits defined in the [`crate::traits`] module.
//!
//! SQLite allows a single writer at a time. Write transactions here are serialised through a per-pool mutex before
//! `BEGIN`, which gives `BEGIN IMMEDIATE` semantics without relying on the busy handler to untangle two deferred
//! transactions that both want to upgrade to a write lock.
use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use super::db::{
    addresses,
    cart,
    db_url,
    inventory,
    new_pool,
    order_items,
    orders::{self, OrderChanges},
    payments,
};
use crate::{
    db_types::{
        Address,
        Money,
        NewOrder,
        NewOrderItem,
        NewPaymentRecord,
        Order,
        OrderItem,
        OrderNo,
        OrderStatusType,
        PayStatus,
        PaymentRecord,
    },
    order_objects::{OrderQueryFilter, OrderStats, Paging},
    state_machine::OrderAction,
    traits::{
        AddressBook,
        CartReconciler,
        GatewayNotification,
        GatewayPaymentOutcome,
        InventoryLedger,
        OrderGatewayDatabase,
        OrderGatewayError,
        OrderManagement,
        StockLine,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using `FDG_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, write_lock: Arc::new(Mutex::new(())) })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Migrations that have already been applied are skipped.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Takes the writer slot and opens a transaction. Keep the guard alive until the transaction is committed or dropped.
    async fn begin_write(&self) -> Result<(MutexGuard<'_, ()>, Transaction<'_, Sqlite>), OrderGatewayError> {
        let guard = self.write_lock.lock().await;
        let tx = self.pool.begin().await?;
        Ok((guard, tx))
    }
}

async fn fetch_existing_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, OrderGatewayError> {
    orders::fetch_order_by_id(order_id, conn).await?.ok_or(OrderGatewayError::OrderNotFound(order_id))
}

/// Deletes the ordered products from the user's cart inside a savepoint. Failure only rolls back the savepoint.
async fn remove_cart_lines_in_savepoint(user_id: i64, product_ids: &[i64], conn: &mut SqliteConnection) {
    let result = async {
        let mut savepoint = conn.begin().await?;
        let removed = cart::remove_lines(user_id, product_ids, &mut savepoint).await?;
        savepoint.commit().await?;
        Ok::<u64, sqlx::Error>(removed)
    }
    .await;
    match result {
        Ok(n) => debug!("🗃️ {n} ordered lines removed from the cart of user {user_id}"),
        Err(e) => warn!("🗃️ Could not clean up the cart of user {user_id}. The order is kept. {e}"),
    }
}

/// Puts the quantities of every item in the order back into stock. Products that have since disappeared from the
/// catalog are skipped.
async fn release_stock(order: &Order, conn: &mut SqliteConnection) -> Result<(), OrderGatewayError> {
    let items = order_items::fetch_items(order.id, conn).await?;
    for item in items {
        match inventory::restock(item.product_id, item.quantity, conn).await {
            Ok(stock) => trace!("🗃️ Returned {} of product {} to stock ({stock})", item.quantity, item.product_id),
            Err(OrderGatewayError::ProductNotFound(id)) => {
                warn!("🗃️ Product {id} from order {} no longer exists. Not restocked.", order.order_no)
            },
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// The order's pending payment record, creating one from the order if it has none yet.
async fn ensure_pending_record(order: &Order, conn: &mut SqliteConnection) -> Result<PaymentRecord, OrderGatewayError> {
    match payments::fetch_record_for_order(order.id, conn).await? {
        Some(record) => Ok(record),
        None => payments::insert_record(NewPaymentRecord::pending(order), conn).await,
    }
}

impl OrderGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let created_at = order.created_at;
        let user_id = order.user_id;
        let lines = items.iter().map(|i| StockLine::new(i.product_id, i.quantity)).collect::<Vec<_>>();
        let product_ids = items.iter().map(|i| i.product_id).collect::<Vec<_>>();
        let order = orders::insert_order(order, &mut tx).await?;
        let saved = order_items::insert_items(order.id, items, created_at, &mut tx).await?;
        trace!("🗃️ {} items saved for order {}", saved.len(), order.order_no);
        inventory::batch_deduct(&lines, &mut tx).await?;
        remove_cart_lines_in_savepoint(user_id, &product_ids, &mut tx).await;
        tx.commit().await?;
        debug!("🗃️ Order {} committed for user {user_id} ({})", order.order_no, order.total_amount);
        Ok(order)
    }

    async fn settle_cash_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::SettleCash)?;
        let changes = OrderChanges::paid(order.total_amount, Utc::now());
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        let record = payments::insert_record(NewPaymentRecord::confirmed(&order), &mut tx).await?;
        tx.commit().await?;
        Ok((order, record))
    }

    async fn settle_cash_on_delivery_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::SettleCashOnDelivery)?;
        let order = orders::update_status_guarded(&order, next, OrderChanges::default(), &mut tx).await?;
        let record = payments::insert_record(NewPaymentRecord::pending(&order), &mut tx).await?;
        tx.commit().await?;
        Ok((order, record))
    }

    async fn record_pending_gateway_payment(&self, order_id: i64) -> Result<PaymentRecord, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        // Only checks that a gateway payment is still possible; the status changes when the callback arrives.
        order.next_status(OrderAction::GatewayPaid)?;
        let record = ensure_pending_record(&order, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn confirm_gateway_payment(
        &self,
        notification: &GatewayNotification,
    ) -> Result<GatewayPaymentOutcome, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = orders::fetch_order_by_order_no(&notification.order_no, &mut tx)
            .await?
            .ok_or_else(|| OrderGatewayError::OrderNumberNotFound(notification.order_no.clone()))?;
        if order.pay_status == PayStatus::Paid {
            let recorded = payments::fetch_record_for_order(order.id, &mut tx).await?.and_then(|r| r.transaction_id);
            match recorded {
                Some(txid) if txid == notification.transaction_id => {
                    return Ok(GatewayPaymentOutcome::AlreadyApplied(order));
                },
                Some(recorded) => {
                    return Err(OrderGatewayError::TransactionMismatch {
                        order_no: order.order_no,
                        recorded,
                        received: notification.transaction_id.clone(),
                    });
                },
                None => {},
            }
        }
        let next = order.next_status(OrderAction::GatewayPaid)?;
        if notification.amount != order.total_amount {
            return Err(OrderGatewayError::AmountMismatch {
                order_no: order.order_no,
                expected: order.total_amount,
                received: notification.amount,
            });
        }
        ensure_pending_record(&order, &mut tx).await?;
        let changes = OrderChanges::paid(notification.amount, Utc::now());
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        let txid = notification.transaction_id.as_str();
        payments::confirm_record(order.id, notification.amount, Some(txid), None, &mut tx).await?;
        tx.commit().await?;
        Ok(GatewayPaymentOutcome::Applied(order))
    }

    async fn confirm_cash_on_delivery(
        &self,
        order_id: i64,
        actual_amount: Money,
        collector_id: i64,
    ) -> Result<(Order, PaymentRecord), OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::ConfirmCashOnDelivery)?;
        let now = Utc::now();
        let changes = OrderChanges::paid(actual_amount, now).and(OrderChanges::finished(now));
        ensure_pending_record(&order, &mut tx).await?;
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        let record = payments::confirm_record(order.id, actual_amount, None, Some(collector_id), &mut tx).await?;
        tx.commit().await?;
        if record.expected_amount != actual_amount {
            info!(
                "🗃️ Cash collected for order {} differs from the total: expected {}, got {actual_amount}",
                order.order_no, record.expected_amount
            );
        }
        Ok((order, record))
    }

    async fn ship_order(&self, order_id: i64, company: &str, tracking_no: &str) -> Result<Order, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::Ship)?;
        let changes = OrderChanges::shipped(company, tracking_no, Utc::now());
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn confirm_receipt(&self, order_id: i64) -> Result<Order, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::ConfirmReceipt)?;
        let order = orders::update_status_guarded(&order, next, OrderChanges::finished(Utc::now()), &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::Cancel)?;
        let changes = OrderChanges::cancelled(reason, Utc::now());
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        release_stock(&order, &mut tx).await?;
        if payments::cancel_pending_record(order.id, &mut tx).await? {
            debug!("🗃️ Pending payment record for order {} cancelled", order.order_no);
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn refund_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let order = fetch_existing_order(order_id, &mut tx).await?;
        let next = order.next_status(OrderAction::Refund)?;
        let mut changes = OrderChanges::refunded(reason, Utc::now());
        if order.pay_status == PayStatus::Paid {
            changes.pay_status = Some(PayStatus::Refunded);
        }
        let order = orders::update_status_guarded(&order, next, changes, &mut tx).await?;
        release_stock(&order, &mut tx).await?;
        payments::cancel_pending_record(order.id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), OrderGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn fetch_order_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_no(order_no, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(order_items::fetch_items(order_id, &mut conn).await?)
    }

    async fn fetch_orders_for_user(
        &self,
        user_id: i64,
        status: Option<OrderStatusType>,
        paging: Paging,
    ) -> Result<(Vec<Order>, i64), OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_user(user_id, status, paging, &mut conn).await?)
    }

    async fn fetch_order_stats_for_user(&self, user_id: i64) -> Result<OrderStats, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::order_stats_for_user(user_id, &mut conn).await?)
    }

    async fn search_orders(
        &self,
        query: OrderQueryFilter,
        paging: Paging,
    ) -> Result<(Vec<Order>, i64), OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, paging, &mut conn).await?)
    }

    async fn fetch_payment_record(&self, order_id: i64) -> Result<Option<PaymentRecord>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_record_for_order(order_id, &mut conn).await?)
    }
}

impl InventoryLedger for SqliteDatabase {
    async fn deduct_stock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let remaining = inventory::deduct_stock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(remaining)
    }

    async fn batch_deduct_stock(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        inventory::batch_deduct(lines, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn restock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        let stock = inventory::restock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(stock)
    }

    async fn fetch_stock(&self, product_id: i64) -> Result<Option<i64>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_stock(product_id, &mut conn).await?)
    }

    async fn record_sales(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError> {
        let (_guard, mut tx) = self.begin_write().await?;
        for line in lines {
            if !inventory::add_sales(line.product_id, line.quantity, &mut tx).await? {
                trace!("🗃️ Product {} not found. Sales counter not updated.", line.product_id);
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

impl CartReconciler for SqliteDatabase {
    async fn remove_ordered_lines(&self, user_id: i64, product_ids: &[i64]) -> Result<u64, OrderGatewayError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        Ok(cart::remove_lines(user_id, product_ids, &mut conn).await?)
    }
}

impl AddressBook for SqliteDatabase {
    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, OrderGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::fetch_address(address_id, &mut conn).await?)
    }
}
