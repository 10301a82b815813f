use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderStatusType},
    fde_api::{
        errors::QueryApiError,
        order_objects::{OrderQueryFilter, OrderStats, OrderWithItems, Page, Paging},
    },
    traits::{OrderGatewayError, OrderManagement},
};

/// Read-only access to orders for customers and administrators.
pub struct QueryApi<B> {
    db: B,
}

impl<B> Debug for QueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryApi")
    }
}

impl<B> QueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> QueryApi<B>
where B: OrderManagement
{
    /// Fetches one of the user's orders with its items. Other users' orders are forbidden.
    pub async fn order_for_user(&self, user_id: i64, order_id: i64) -> Result<OrderWithItems, QueryApiError> {
        let order = self.fetch_order(order_id).await?;
        if order.user_id != user_id {
            warn!("💻️ User #{user_id} requested order {} which belongs to user #{}", order.order_no, order.user_id);
            return Err(QueryApiError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        self.with_items(order).await
    }

    /// Fetches any order with its items.
    pub async fn order_by_id(&self, order_id: i64) -> Result<OrderWithItems, QueryApiError> {
        let order = self.fetch_order(order_id).await?;
        self.with_items(order).await
    }

    pub async fn list_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatusType>,
        paging: Paging,
    ) -> Result<Page<Order>, QueryApiError> {
        let (orders, total) = self.db.fetch_orders_for_user(user_id, status, paging).await?;
        trace!("💻️ {} of {total} orders fetched for user #{user_id}", orders.len());
        Ok(Page::new(orders, total, paging))
    }

    pub async fn order_stats(&self, user_id: i64) -> Result<OrderStats, QueryApiError> {
        Ok(self.db.fetch_order_stats_for_user(user_id).await?)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter, paging: Paging) -> Result<Page<Order>, QueryApiError> {
        if let (Some(since), Some(until)) = (query.since, query.until) {
            if since > until {
                return Err(QueryApiError::InvalidQuery("'since' must not be later than 'until'".into()));
            }
        }
        debug!("💻️ Searching orders. {query}");
        let (orders, total) = self.db.search_orders(query, paging).await?;
        trace!("💻️ {} of {total} matching orders fetched", orders.len());
        Ok(Page::new(orders, total, paging))
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Order, QueryApiError> {
        let order = self.db.fetch_order_by_id(order_id).await?.ok_or(OrderGatewayError::OrderNotFound(order_id))?;
        Ok(order)
    }

    async fn with_items(&self, order: Order) -> Result<OrderWithItems, QueryApiError> {
        let items = self.db.fetch_order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }
}
