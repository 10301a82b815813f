use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, Order, OrderNo, OrderStatusType, PayStatus, PaymentMethod, PaymentRecord},
    traits::GatewayParams,
};

/// What happened when an order was sent through the settlement router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The client must complete payment with the gateway using these parameters. The order is still awaiting payment.
    Electronic { order_no: OrderNo, params: GatewayParams },
    /// Cash was recorded and the order is ready to ship.
    Cash { order: Order, record: PaymentRecord },
    /// Cash will be collected on delivery. The order is on its way to the receiver.
    CashOnDelivery { order: Order, record: PaymentRecord },
}

impl SettlementOutcome {
    pub fn order_no(&self) -> &OrderNo {
        match self {
            SettlementOutcome::Electronic { order_no, .. } => order_no,
            SettlementOutcome::Cash { order, .. } | SettlementOutcome::CashOnDelivery { order, .. } => &order.order_no,
        }
    }
}

/// How a gateway callback was handled. Every variant is acknowledged to the gateway as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The order was marked as paid
    Paid(Order),
    /// The notification repeats one that was already applied
    Duplicate(Order),
    /// The gateway reported an unsuccessful payment. The order is left unpaid.
    Declined(OrderNo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusView {
    pub order_id: i64,
    pub order_no: OrderNo,
    pub status: OrderStatusType,
    pub pay_status: PayStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub pay_amount: Option<Money>,
    pub record: Option<PaymentRecord>,
}

impl PaymentStatusView {
    pub fn new(order: Order, record: Option<PaymentRecord>) -> Self {
        Self {
            order_id: order.id,
            order_no: order.order_no,
            status: order.status,
            pay_status: order.pay_status,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            pay_amount: order.pay_amount,
            record,
        }
    }
}
