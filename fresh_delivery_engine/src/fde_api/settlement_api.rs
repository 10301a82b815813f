use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Money, Order, OrderNo, PaymentMethod, PaymentRecord},
    events::{EventProducers, OrderCompletedEvent, OrderPaidEvent},
    fde_api::{
        errors::SettlementError,
        settlement_objects::{NotificationOutcome, PaymentStatusView, SettlementOutcome},
    },
    helpers::is_valid_order_number,
    state_machine::OrderAction,
    traits::{GatewayPaymentOutcome, OrderGatewayDatabase, OrderGatewayError, PaymentGateway, PrepayRequest},
};

/// The payment settlement router.
///
/// Each order carries the payment method chosen at checkout, and [`SettlementApi::pay_order`] dispatches to the
/// matching strategy: electronic prepay through the [`PaymentGateway`], cash recorded on the spot, or cash collected on
/// delivery. Gateway callbacks and courier cash confirmations finish the job.
pub struct SettlementApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    notify_url: String,
}

impl<B, G> Debug for SettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({})", self.notify_url)
    }
}

impl<B, G> SettlementApi<B, G> {
    pub fn new<S: Into<String>>(db: B, gateway: G, producers: EventProducers, notify_url: S) -> Self {
        Self { db, gateway, producers, notify_url: notify_url.into() }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> SettlementApi<B, G>
where
    B: OrderGatewayDatabase,
    G: PaymentGateway,
{
    /// Settles one of the user's orders using the payment method chosen at checkout.
    ///
    /// The order must still be awaiting payment.
    pub async fn pay_order(&self, user_id: i64, order_id: i64) -> Result<SettlementOutcome, SettlementError> {
        let order = self.db.fetch_order_by_id(order_id).await?.ok_or(OrderGatewayError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            warn!("💰️ User #{user_id} tried to pay for order {} of user #{}", order.order_no, order.user_id);
            return Err(SettlementError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        let action = match order.payment_method {
            PaymentMethod::Electronic => OrderAction::GatewayPaid,
            PaymentMethod::Cash => OrderAction::SettleCash,
            PaymentMethod::CashOnDelivery => OrderAction::SettleCashOnDelivery,
        };
        order.next_status(action).map_err(OrderGatewayError::from)?;
        match order.payment_method {
            PaymentMethod::Electronic => self.prepay(order).await,
            PaymentMethod::Cash => {
                let (order, record) = self.db.settle_cash_order(order_id).await?;
                info!("💰️ Cash payment of {} recorded for order {}", order.total_amount, order.order_no);
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                Ok(SettlementOutcome::Cash { order, record })
            },
            PaymentMethod::CashOnDelivery => {
                let (order, record) = self.db.settle_cash_on_delivery_order(order_id).await?;
                info!("💰️ Order {} will collect {} on delivery", order.order_no, order.total_amount);
                Ok(SettlementOutcome::CashOnDelivery { order, record })
            },
        }
    }

    async fn prepay(&self, order: Order) -> Result<SettlementOutcome, SettlementError> {
        let record = self.db.record_pending_gateway_payment(order.id).await?;
        trace!("💰️ Pending payment record #{} for order {}", record.id, order.order_no);
        let request = PrepayRequest {
            order_no: order.order_no.clone(),
            amount: order.total_amount,
            description: format!("Fresh delivery order {}", order.order_no.as_str()),
            callback_url: self.notify_url.clone(),
        };
        let params = self.gateway.prepay(request).await.map_err(|e| {
            error!("💰️ The payment gateway could not prepare payment for order {}. {e}", order.order_no);
            e
        })?;
        debug!("💰️ Gateway parameters issued for order {}", order.order_no);
        Ok(SettlementOutcome::Electronic { order_no: order.order_no, params })
    }

    /// Handles a raw callback from the payment gateway.
    ///
    /// A successful notification marks the order as paid. Repeats of a notification that was already applied are
    /// accepted without changing anything, and unsuccessful payments leave the order untouched.
    pub async fn process_gateway_notification(&self, body: &[u8]) -> Result<NotificationOutcome, SettlementError> {
        let notification = self.gateway.parse_notification(body).map_err(|e| {
            warn!("💰️ Rejecting gateway notification. {e}");
            e
        })?;
        if !notification.success {
            info!("💰️ Gateway reports that payment for order {} did not go through", notification.order_no);
            return Ok(NotificationOutcome::Declined(notification.order_no));
        }
        match self.db.confirm_gateway_payment(&notification).await? {
            GatewayPaymentOutcome::Applied(order) => {
                info!(
                    "💰️ Order {} paid electronically ({}, txid {})",
                    order.order_no, notification.amount, notification.transaction_id
                );
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                Ok(NotificationOutcome::Paid(order))
            },
            GatewayPaymentOutcome::AlreadyApplied(order) => {
                debug!("💰️ Duplicate notification for order {} ignored", order.order_no);
                Ok(NotificationOutcome::Duplicate(order))
            },
        }
    }

    /// The reply body the gateway expects for a callback.
    pub fn acknowledgement(&self, accepted: bool) -> String {
        self.gateway.acknowledgement(accepted)
    }

    /// A courier (or admin) confirms that cash was collected on delivery. The order is completed and paid.
    pub async fn confirm_cash_on_delivery(
        &self,
        order_id: i64,
        actual_amount: Money,
        collector_id: i64,
    ) -> Result<(Order, PaymentRecord), SettlementError> {
        if actual_amount.is_negative() {
            return Err(SettlementError::InvalidAmount(format!("{actual_amount} is not a valid collected amount")));
        }
        let (order, record) = self.db.confirm_cash_on_delivery(order_id, actual_amount, collector_id).await?;
        if actual_amount != record.expected_amount {
            warn!(
                "💰️ Collector #{collector_id} took {actual_amount} for order {}, which expected {}",
                order.order_no, record.expected_amount
            );
        }
        info!("💰️ Cash on delivery confirmed for order {} by collector #{collector_id}", order.order_no);
        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
        if !self.producers.order_completed_producer.is_empty() {
            let items = self.db.fetch_order_items(order.id).await.unwrap_or_else(|e| {
                warn!("💰️ Could not load items for order {} event. {e}", order.order_no);
                Vec::new()
            });
            self.producers.publish_order_completed(OrderCompletedEvent::new(order.clone(), items)).await;
        }
        Ok((order, record))
    }

    /// The payment state of an order. When `user_id` is given, the order must belong to that user.
    pub async fn payment_status(
        &self,
        user_id: Option<i64>,
        order_no: &OrderNo,
    ) -> Result<PaymentStatusView, SettlementError> {
        if !is_valid_order_number(order_no.as_str()) {
            return Err(OrderGatewayError::OrderNumberNotFound(order_no.clone()).into());
        }
        let order = self
            .db
            .fetch_order_by_order_no(order_no)
            .await?
            .ok_or_else(|| OrderGatewayError::OrderNumberNotFound(order_no.clone()))?;
        if let Some(user_id) = user_id {
            if order.user_id != user_id {
                return Err(SettlementError::Forbidden(format!("Order {order_no} does not belong to you")));
            }
        }
        let record = self.db.fetch_payment_record(order.id).await?;
        Ok(PaymentStatusView::new(order, record))
    }
}
