use thiserror::Error;

use crate::{
    db_types::{Money, NewOrder, NewOrderItem, Order, OrderNo, PaymentRecord},
    state_machine::TransitionError,
    traits::{
        data_objects::GatewayPaymentOutcome,
        AddressBook,
        CartReconciler,
        GatewayNotification,
        InventoryLedger,
        OrderManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the order engine.
///
/// Every method that mutates an order runs as a single database transaction, checks the requested transition against
/// the order state machine, and applies it with a status-guarded update. Two concurrent callers can therefore never
/// both move an order out of the same state.
#[allow(async_fn_in_trait)]
pub trait OrderGatewayDatabase: Clone + OrderManagement + InventoryLedger + CartReconciler + AddressBook {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Persists a priced order and its line items in one atomic transaction:
    ///
    /// 1. The order row is inserted with status `awaiting_payment` and payment status `unpaid`.
    /// 2. One item row is inserted per line.
    /// 3. Stock is deducted for every line, in input order. The first line that cannot be fulfilled aborts the whole
    ///    transaction, so no order, item or stock change from this attempt survives.
    /// 4. The ordered products are removed from the user's cart inside a savepoint. A cart failure only rolls back the
    ///    savepoint and is logged; the order still commits.
    ///
    /// If the order number is already taken, [`OrderGatewayError::DuplicateOrderNumber`] is returned and nothing is
    /// written. The caller is expected to retry with a new number.
    async fn insert_order_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, OrderGatewayError>;

    /// Records a confirmed cash receipt for the full order total and moves the order to `awaiting_shipment` / `paid`.
    async fn settle_cash_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError>;

    /// Records a pending cash-on-delivery expectation and moves the order straight to `awaiting_receipt`. The payment
    /// status stays `unpaid` until the courier confirms the cash.
    async fn settle_cash_on_delivery_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError>;

    /// Creates (or returns the existing) pending payment record for an electronic order that is about to be handed to
    /// the payment gateway. The order status is not changed.
    async fn record_pending_gateway_payment(&self, order_id: i64) -> Result<PaymentRecord, OrderGatewayError>;

    /// Applies a successful gateway notification. The order moves to `awaiting_shipment` / `paid` and the payment
    /// record is confirmed with the gateway's transaction id.
    ///
    /// A repeat of an already applied notification (same transaction id) is reported as
    /// [`GatewayPaymentOutcome::AlreadyApplied`] and changes nothing. An amount that differs from the order total is
    /// rejected with [`OrderGatewayError::AmountMismatch`].
    async fn confirm_gateway_payment(
        &self,
        notification: &GatewayNotification,
    ) -> Result<GatewayPaymentOutcome, OrderGatewayError>;

    /// Finalises a cash-on-delivery order once the courier has collected `actual_amount`.
    ///
    /// The order becomes `completed` and `paid`; the payment record keeps both the expected and the actual amount, and
    /// who collected it.
    async fn confirm_cash_on_delivery(
        &self,
        order_id: i64,
        actual_amount: Money,
        collector_id: i64,
    ) -> Result<(Order, PaymentRecord), OrderGatewayError>;

    /// Marks the order as dispatched with the given carrier and tracking number.
    async fn ship_order(&self, order_id: i64, company: &str, tracking_no: &str) -> Result<Order, OrderGatewayError>;

    /// The receiver confirms delivery. The order becomes `completed`.
    async fn confirm_receipt(&self, order_id: i64) -> Result<Order, OrderGatewayError>;

    /// Cancels an order that has not shipped yet. Reserved stock is returned and any pending payment record is
    /// cancelled. The payment status is left alone.
    async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError>;

    /// Refunds an order that is not yet finished. Reserved stock is returned, and a paid order is marked `refunded`.
    async fn refund_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNumberNotFound(OrderNo),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Address {0} does not exist or does not belong to the caller")]
    AddressNotOwned(i64),
    #[error("Cannot fulfill quantity {requested} of product {product_id}. Only {available} left in stock")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Stock adjustments must be for a positive quantity. Got {0}")]
    InvalidQuantity(i64),
    #[error("Order number {0} is already in use")]
    DuplicateOrderNumber(OrderNo),
    #[error("{0}")]
    IllegalTransition(#[from] TransitionError),
    #[error("Order {0} was modified by another request. Please try again")]
    ConcurrentModification(OrderNo),
    #[error("Payment for order {order_no} should be {expected}, but {received} was received")]
    AmountMismatch { order_no: OrderNo, expected: Money, received: Money },
    #[error("Order {order_no} was already paid by transaction {recorded}, not {received}")]
    TransactionMismatch { order_no: OrderNo, recorded: String, received: String },
    #[error("There is no payment record for order {0}")]
    PaymentRecordNotFound(i64),
}

impl From<sqlx::Error> for OrderGatewayError {
    fn from(e: sqlx::Error) -> Self {
        OrderGatewayError::DatabaseError(e.to_string())
    }
}
