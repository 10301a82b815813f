use fresh_delivery_engine::{
    db_types::{
        Address,
        Money,
        NewOrder,
        NewOrderItem,
        Order,
        OrderItem,
        OrderNo,
        OrderStatusType,
        PaymentRecord,
    },
    order_objects::{OrderQueryFilter, OrderStats, Paging},
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
use mockall::mock;

mock! {
    pub Backend {}
    impl Clone for Backend {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for Backend {
        async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderGatewayError>;
        async fn fetch_order_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, OrderGatewayError>;
        async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderGatewayError>;
        async fn fetch_orders_for_user(&self, user_id: i64, status: Option<OrderStatusType>, paging: Paging) -> Result<(Vec<Order>, i64), OrderGatewayError>;
        async fn fetch_order_stats_for_user(&self, user_id: i64) -> Result<OrderStats, OrderGatewayError>;
        async fn search_orders(&self, query: OrderQueryFilter, paging: Paging) -> Result<(Vec<Order>, i64), OrderGatewayError>;
        async fn fetch_payment_record(&self, order_id: i64) -> Result<Option<PaymentRecord>, OrderGatewayError>;
    }
    impl InventoryLedger for Backend {
        async fn deduct_stock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError>;
        async fn batch_deduct_stock(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError>;
        async fn restock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError>;
        async fn fetch_stock(&self, product_id: i64) -> Result<Option<i64>, OrderGatewayError>;
        async fn record_sales(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError>;
    }
    impl CartReconciler for Backend {
        async fn remove_ordered_lines(&self, user_id: i64, product_ids: &[i64]) -> Result<u64, OrderGatewayError>;
    }
    impl AddressBook for Backend {
        async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, OrderGatewayError>;
    }
    impl OrderGatewayDatabase for Backend {
        fn url(&self) -> &str;
        async fn insert_order_with_items(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderGatewayError>;
        async fn settle_cash_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError>;
        async fn settle_cash_on_delivery_order(&self, order_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError>;
        async fn record_pending_gateway_payment(&self, order_id: i64) -> Result<PaymentRecord, OrderGatewayError>;
        async fn confirm_gateway_payment(&self, notification: &GatewayNotification) -> Result<GatewayPaymentOutcome, OrderGatewayError>;
        async fn confirm_cash_on_delivery(&self, order_id: i64, actual_amount: Money, collector_id: i64) -> Result<(Order, PaymentRecord), OrderGatewayError>;
        async fn ship_order(&self, order_id: i64, company: &str, tracking_no: &str) -> Result<Order, OrderGatewayError>;
        async fn confirm_receipt(&self, order_id: i64) -> Result<Order, OrderGatewayError>;
        async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError>;
        async fn refund_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderGatewayError>;
    }
}
