use crate::{
    db_types::{Order, OrderItem, OrderNo, OrderStatusType, PaymentRecord},
    order_objects::{OrderQueryFilter, OrderStats, Paging},
    traits::OrderGatewayError,
};

/// Read-only queries over orders, their items and their payment records.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderGatewayError>;

    async fn fetch_order_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, OrderGatewayError>;

    /// The line items of an order, in the order they were submitted.
    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderGatewayError>;

    /// A page of the user's orders, newest first, together with the total number of matching orders.
    async fn fetch_orders_for_user(
        &self,
        user_id: i64,
        status: Option<OrderStatusType>,
        paging: Paging,
    ) -> Result<(Vec<Order>, i64), OrderGatewayError>;

    /// Counts the user's orders in each of the active states.
    async fn fetch_order_stats_for_user(&self, user_id: i64) -> Result<OrderStats, OrderGatewayError>;

    /// Fetches one page of the orders matching the `OrderQueryFilter`, newest first, with the total number of matches.
    /// The order number fragment matches literally; `%` and `_` are not wildcards.
    async fn search_orders(
        &self,
        query: OrderQueryFilter,
        paging: Paging,
    ) -> Result<(Vec<Order>, i64), OrderGatewayError>;

    async fn fetch_payment_record(&self, order_id: i64) -> Result<Option<PaymentRecord>, OrderGatewayError>;
}
