use crate::traits::{data_objects::StockLine, OrderGatewayError};

/// Per-product stock accounting.
///
/// Deductions are a single compare-and-decrement, so stock can never go negative and two concurrent deductions can never
/// both see the same units as available.
#[allow(async_fn_in_trait)]
pub trait InventoryLedger {
    /// Removes `quantity` units of the product from stock, returning the remaining stock.
    ///
    /// Fails with `InsufficientStock` (naming the current stock) or `ProductNotFound` without changing anything.
    async fn deduct_stock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError>;

    /// Deducts every line in order, stopping at the first failure. There are no compensating increments, so the backend
    /// runs the whole batch in one transaction.
    async fn batch_deduct_stock(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError>;

    /// Returns `quantity` units to stock, returning the new stock level.
    async fn restock(&self, product_id: i64, quantity: i64) -> Result<i64, OrderGatewayError>;

    async fn fetch_stock(&self, product_id: i64) -> Result<Option<i64>, OrderGatewayError>;

    /// Adds the quantities of a completed order to the products' sales counters. Unknown products are skipped.
    async fn record_sales(&self, lines: &[StockLine]) -> Result<(), OrderGatewayError>;
}
