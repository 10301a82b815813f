use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Money, NewOrder, NewOrderItem, Order},
    events::{EventProducers, OrderCancelledEvent, OrderCompletedEvent, OrderCreatedEvent, OrderRefundedEvent},
    fde_api::{
        errors::OrderFlowError,
        order_objects::{NewOrderLine, NewOrderRequest, OrderCreated},
        pricing::{PricingPolicy, PricingPolicyHandle},
    },
    helpers::new_order_number,
    traits::{OrderGatewayDatabase, OrderGatewayError},
};

/// How many fresh order numbers to try before giving up on a creation request.
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

const CUSTOMER_CANCEL_REASON: &str = "Cancelled by customer";

/// `OrderFlowApi` is the primary API for turning a cart selection into an order and driving it through fulfilment.
///
/// It coordinates address validation, pricing, persistence, stock deduction and cart cleanup on creation, and gates
/// every later change (shipping, receipt, cancellation, refund) through the order state machine in the backend.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    pricing: PricingPolicyHandle,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, pricing: PricingPolicyHandle) -> Self {
        Self { db, producers, pricing }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        self.pricing.current()
    }

    /// Replaces the delivery fee table for every API sharing this policy handle.
    pub fn update_pricing_policy(&self, policy: PricingPolicy) {
        self.pricing.update(policy);
    }

    /// Restores the default delivery fees.
    pub fn reset_pricing_policy(&self) {
        self.pricing.reset();
    }
}

impl<B> OrderFlowApi<B>
where B: OrderGatewayDatabase
{
    /// Creates a new order from the user's cart selection.
    ///
    /// The lines are validated and priced, the delivery address is resolved into a receiver snapshot, and the whole
    /// order is then persisted in one transaction together with its stock deductions and cart cleanup. If any line
    /// cannot be fulfilled, nothing is written.
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<OrderCreated, OrderFlowError> {
        validate_lines(&request.lines)?;
        let address = self
            .db
            .fetch_address(request.address_id)
            .await?
            .filter(|a| a.user_id == request.user_id && !a.is_deleted)
            .ok_or(OrderGatewayError::AddressNotOwned(request.address_id))?;
        let items = price_lines(&request.lines)?;
        let subtotal = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.subtotal))
            .ok_or_else(|| OrderFlowError::InvalidOrderLine("The order subtotal is too large".into()))?;
        let delivery_fee = self.pricing.current().delivery_fee(request.delivery_type);
        let total_amount = subtotal
            .checked_add(delivery_fee)
            .ok_or_else(|| OrderFlowError::InvalidOrderLine("The order total is too large".into()))?;
        trace!(
            "📦️ Priced order for user #{}: subtotal {subtotal} + delivery {delivery_fee} = {total_amount}",
            request.user_id
        );

        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            let new_order = NewOrder {
                order_no: new_order_number(),
                user_id: request.user_id,
                subtotal,
                delivery_fee,
                total_amount,
                payment_method: request.payment_method,
                delivery_type: request.delivery_type,
                receiver_name: address.receiver_name.clone(),
                receiver_phone: address.receiver_phone.clone(),
                receiver_address: address.composed(),
                remark: request.remark.clone(),
                created_at: Utc::now(),
            };
            match self.db.insert_order_with_items(new_order, items.clone()).await {
                Ok(order) => {
                    info!("📦️ Order {} created for user #{} ({total_amount})", order.order_no, order.user_id);
                    self.call_order_created_hook(&order).await;
                    return Ok(OrderCreated::from(&order));
                },
                Err(OrderGatewayError::DuplicateOrderNumber(no)) => {
                    warn!("📦️ Order number {no} collided (attempt {attempt}/{MAX_ORDER_NUMBER_ATTEMPTS}). Retrying.");
                },
                Err(e) => {
                    debug!("📦️ Order creation for user #{} failed. {e}", request.user_id);
                    return Err(e.into());
                },
            }
        }
        error!("📦️ Could not find a free order number after {MAX_ORDER_NUMBER_ATTEMPTS} attempts");
        Err(OrderFlowError::OrderNumberExhausted(MAX_ORDER_NUMBER_ATTEMPTS))
    }

    /// The customer cancels one of their own orders. Only orders that have not shipped can be cancelled.
    pub async fn cancel_order_for_user(
        &self,
        user_id: i64,
        order_id: i64,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        self.fetch_owned_order(user_id, order_id).await?;
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| CUSTOMER_CANCEL_REASON.to_string());
        self.cancel_order(order_id, &reason).await
    }

    /// Cancels any order that has not shipped yet. Stock is returned to the ledger.
    pub async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.cancel_order(order_id, reason).await?;
        info!("📦️ Order {} cancelled. Reason: {reason}", order.order_no);
        self.producers.publish_order_cancelled(OrderCancelledEvent::new(order.clone(), reason)).await;
        Ok(order)
    }

    /// The customer confirms that their order has arrived.
    pub async fn confirm_receipt(&self, user_id: i64, order_id: i64) -> Result<Order, OrderFlowError> {
        self.fetch_owned_order(user_id, order_id).await?;
        self.confirm_receipt_on_behalf(order_id).await
    }

    /// Confirms receipt without checking who owns the order. This is an administrative action, used when the customer
    /// reports delivery through another channel.
    pub async fn confirm_receipt_on_behalf(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.db.confirm_receipt(order_id).await?;
        info!("📦️ Order {} delivered and completed", order.order_no);
        self.call_order_completed_hook(&order).await;
        Ok(order)
    }

    pub async fn ship_order(&self, order_id: i64, company: &str, tracking_no: &str) -> Result<Order, OrderFlowError> {
        if company.trim().is_empty() || tracking_no.trim().is_empty() {
            return Err(OrderFlowError::InvalidRequest("A shipping company and tracking number are required".into()));
        }
        let order = self.db.ship_order(order_id, company.trim(), tracking_no.trim()).await?;
        info!("📦️ Order {} shipped with {company} ({tracking_no})", order.order_no);
        Ok(order)
    }

    /// Refunds an order that has not been completed. This is an administrative action.
    pub async fn refund_order(&self, order_id: i64, reason: &str) -> Result<Order, OrderFlowError> {
        if reason.trim().is_empty() {
            return Err(OrderFlowError::InvalidRequest("A refund needs a reason".into()));
        }
        let order = self.db.refund_order(order_id, reason).await?;
        info!("📦️ Order {} refunded. Reason: {reason}", order.order_no);
        self.producers.publish_order_refunded(OrderRefundedEvent::new(order.clone(), reason)).await;
        Ok(order)
    }

    async fn fetch_owned_order(&self, user_id: i64, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order_by_id(order_id).await?.ok_or(OrderGatewayError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            warn!("📦️ User #{user_id} tried to act on order {} belonging to user #{}", order.order_no, order.user_id);
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        Ok(order)
    }

    async fn call_order_created_hook(&self, order: &Order) {
        if self.producers.order_created_producer.is_empty() {
            return;
        }
        let items = self.db.fetch_order_items(order.id).await.unwrap_or_else(|e| {
            warn!("📦️ Could not load items for order {} event. {e}", order.order_no);
            Vec::new()
        });
        debug!("🔄️📦️ Notifying order created hook subscribers");
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone(), items)).await;
    }

    async fn call_order_completed_hook(&self, order: &Order) {
        if self.producers.order_completed_producer.is_empty() {
            return;
        }
        let items = self.db.fetch_order_items(order.id).await.unwrap_or_else(|e| {
            warn!("📦️ Could not load items for order {} event. {e}", order.order_no);
            Vec::new()
        });
        debug!("🔄️📦️ Notifying order completed hook subscribers");
        self.producers.publish_order_completed(OrderCompletedEvent::new(order.clone(), items)).await;
    }
}

/// Checks the lines of an order request before anything touches the database.
pub fn validate_lines(lines: &[NewOrderLine]) -> Result<(), OrderFlowError> {
    if lines.is_empty() {
        return Err(OrderFlowError::InvalidOrderLine("An order needs at least one line".into()));
    }
    for (i, line) in lines.iter().enumerate() {
        let n = i + 1;
        if line.product_id <= 0 {
            return Err(OrderFlowError::InvalidOrderLine(format!("Line {n} has an invalid product id")));
        }
        if line.quantity <= 0 {
            return Err(OrderFlowError::InvalidOrderLine(format!("Line {n} must have a quantity of at least 1")));
        }
        if line.unit_price.is_negative() {
            return Err(OrderFlowError::InvalidOrderLine(format!("Line {n} has a negative price")));
        }
        if line.name.trim().is_empty() {
            return Err(OrderFlowError::InvalidOrderLine(format!("Line {n} has no product name")));
        }
    }
    Ok(())
}

/// Turns request lines into item snapshots with their line subtotals.
pub fn price_lines(lines: &[NewOrderLine]) -> Result<Vec<NewOrderItem>, OrderFlowError> {
    lines
        .iter()
        .map(|line| {
            let subtotal = line.unit_price.checked_mul(line.quantity).ok_or_else(|| {
                OrderFlowError::InvalidOrderLine(format!("The subtotal for product {} is too large", line.product_id))
            })?;
            Ok(NewOrderItem {
                product_id: line.product_id,
                product_name: line.name.trim().to_string(),
                product_image: line.image.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal,
            })
        })
        .collect()
}
