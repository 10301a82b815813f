//! Order lifecycle rules.
//!
//! Every mutating operation on an order goes through [`Order::next_status`] before anything is written. The raw
//! status table lives in [`OrderStatusType::apply`]:
//!
//! | from \ action       | SettleCash | SettleCod | GatewayPaid | Ship     | ConfirmReceipt | ConfirmCod | Cancel    | Refund    |
//! |---------------------|------------|-----------|-------------|----------|----------------|------------|-----------|-----------|
//! | `awaiting_payment`  | shipment   | receipt   | shipment    | Err      | Err            | Err        | cancelled | refunded  |
//! | `awaiting_shipment` | Err        | Err       | Err         | receipt  | Err            | Err        | cancelled | refunded  |
//! | `awaiting_receipt`  | Err        | Err       | Err         | Err      | completed      | completed  | Err       | refunded  |
//! | terminal            | Err        | Err       | Err         | Err      | Err            | Err        | Err       | Err       |
//!
//! On top of the table, [`Order::next_status`] checks the payment method and payment status where an action depends
//! on them.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Order, OrderNo, OrderStatusType, PayStatus, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    SettleCash,
    SettleCashOnDelivery,
    GatewayPaid,
    Ship,
    ConfirmReceipt,
    ConfirmCashOnDelivery,
    Cancel,
    Refund,
}

impl Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderAction::SettleCash => "settle with cash",
            OrderAction::SettleCashOnDelivery => "settle as cash on delivery",
            OrderAction::GatewayPaid => "mark as paid by the gateway",
            OrderAction::Ship => "ship",
            OrderAction::ConfirmReceipt => "confirm receipt",
            OrderAction::ConfirmCashOnDelivery => "confirm cash on delivery",
            OrderAction::Cancel => "cancel",
            OrderAction::Refund => "refund",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} order {order_no} while it is {current}{}", .detail.as_ref().map(|d| format!(". {d}")).unwrap_or_default())]
pub struct TransitionError {
    pub order_no: OrderNo,
    pub current: OrderStatusType,
    pub action: OrderAction,
    pub detail: Option<String>,
}

impl OrderStatusType {
    /// The status an order moves to when `action` is applied, or `None` if the table forbids it.
    pub fn apply(self, action: OrderAction) -> Option<OrderStatusType> {
        use OrderAction::*;
        use OrderStatusType::*;
        match (self, action) {
            (AwaitingPayment, SettleCash | GatewayPaid) => Some(AwaitingShipment),
            (AwaitingPayment, SettleCashOnDelivery) => Some(AwaitingReceipt),
            (AwaitingShipment, Ship) => Some(AwaitingReceipt),
            (AwaitingReceipt, ConfirmReceipt | ConfirmCashOnDelivery) => Some(Completed),
            (AwaitingPayment | AwaitingShipment, Cancel) => Some(Cancelled),
            (AwaitingPayment | AwaitingShipment | AwaitingReceipt, Refund) => Some(Refunded),
            _ => None,
        }
    }
}

impl Order {
    /// Checks whether `action` is legal for this order, returning the resulting status.
    pub fn next_status(&self, action: OrderAction) -> Result<OrderStatusType, TransitionError> {
        let refuse = |detail: Option<&str>| TransitionError {
            order_no: self.order_no.clone(),
            current: self.status,
            action,
            detail: detail.map(String::from),
        };
        let next = self.status.apply(action).ok_or_else(|| refuse(None))?;
        match action {
            OrderAction::SettleCash if self.payment_method != PaymentMethod::Cash => {
                Err(refuse(Some("The order is not a cash order")))
            },
            OrderAction::SettleCashOnDelivery if self.payment_method != PaymentMethod::CashOnDelivery => {
                Err(refuse(Some("The order is not a cash-on-delivery order")))
            },
            OrderAction::GatewayPaid if self.payment_method != PaymentMethod::Electronic => {
                Err(refuse(Some("The order is not an electronic payment order")))
            },
            OrderAction::ConfirmCashOnDelivery if self.payment_method != PaymentMethod::CashOnDelivery => {
                Err(refuse(Some("The order is not a cash-on-delivery order")))
            },
            OrderAction::ConfirmCashOnDelivery if self.pay_status != PayStatus::Unpaid => {
                Err(refuse(Some("The cash has already been confirmed")))
            },
            OrderAction::ConfirmReceipt
                if self.payment_method == PaymentMethod::CashOnDelivery && self.pay_status == PayStatus::Unpaid =>
            {
                Err(refuse(Some("The cash collected on delivery has not been confirmed yet")))
            },
            _ => Ok(next),
        }
    }
}
