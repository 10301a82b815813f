use crate::traits::OrderGatewayError;

#[allow(async_fn_in_trait)]
pub trait CartReconciler {
    /// Deletes the user's cart lines for exactly these products, returning how many lines were removed. Lines for other
    /// products are left in place. An empty list is a no-op.
    async fn remove_ordered_lines(&self, user_id: i64, product_ids: &[i64]) -> Result<u64, OrderGatewayError>;
}
