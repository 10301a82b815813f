use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use fdg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `code()`, `Display` and a `FromStr` that accepts either the snake_case name or the numeric code.
macro_rules! coded_enum {
    ($name:ident, $kind:literal, { $($variant:ident => ($code:literal, $label:literal)),+ $(,)? }) => {
        impl $name {
            pub fn code(&self) -> i32 {
                *self as i32
            }

            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => s
                        .parse::<i32>()
                        .ok()
                        .and_then(Self::from_code)
                        .ok_or_else(|| ConversionError::new($kind, s)),
                }
            }
        }
    };
}

//--------------------------------------        OrderNo        ---------------------------------------------------------
/// The externally visible order number, e.g. `FD2024061512000100014821`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNo(pub String);

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created and stock is reserved, but no payment has been settled.
    AwaitingPayment = 0,
    /// Payment is settled (or recorded as cash) and the order is waiting to be dispatched.
    AwaitingShipment = 1,
    /// The order is on its way to the receiver.
    AwaitingReceipt = 2,
    /// The receiver has confirmed delivery.
    Completed = 3,
    /// The order was cancelled before it shipped.
    Cancelled = 4,
    /// The order was refunded by an administrator.
    Refunded = 5,
}

coded_enum!(OrderStatusType, "order status", {
    AwaitingPayment => (0, "awaiting_payment"),
    AwaitingShipment => (1, "awaiting_shipment"),
    AwaitingReceipt => (2, "awaiting_receipt"),
    Completed => (3, "completed"),
    Cancelled => (4, "cancelled"),
    Refunded => (5, "refunded"),
});

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

//--------------------------------------      PayStatus        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
    Unpaid = 0,
    Paid = 1,
    Refunded = 2,
}

coded_enum!(PayStatus, "payment status", {
    Unpaid => (0, "unpaid"),
    Paid => (1, "paid"),
    Refunded => (2, "refunded"),
});

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Prepaid through the payment gateway
    Electronic = 1,
    /// Cash handed over at the point of sale and recorded immediately
    Cash = 2,
    /// Cash collected by the courier on delivery
    CashOnDelivery = 3,
}

coded_enum!(PaymentMethod, "payment method", {
    Electronic => (1, "electronic"),
    Cash => (2, "cash"),
    CashOnDelivery => (3, "cash_on_delivery"),
});

//--------------------------------------     DeliveryType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[default]
    Standard = 1,
    Expedited = 2,
}

coded_enum!(DeliveryType, "delivery type", {
    Standard => (1, "standard"),
    Expedited => (2, "expedited"),
});

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: OrderNo,
    pub user_id: i64,
    /// Sum of all line subtotals
    pub subtotal: Money,
    pub delivery_fee: Money,
    /// `subtotal + delivery_fee`
    pub total_amount: Money,
    /// The amount actually received. Only set once the order is paid.
    pub pay_amount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub pay_status: PayStatus,
    pub status: OrderStatusType,
    pub delivery_type: DeliveryType,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub remark: Option<String>,
    pub cancel_reason: Option<String>,
    pub refund_reason: Option<String>,
    pub shipping_company: Option<String>,
    pub tracking_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// A fully priced order, ready to be persisted. The coordinator builds this after validation and pricing.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: OrderNo,
    pub user_id: i64,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

//--------------------------------------       Address         ---------------------------------------------------------
/// Read-only view of an address book entry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub province: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub detail_address: Option<String>,
    pub is_deleted: bool,
}

impl Address {
    /// The address as a single line, suitable for the receiver snapshot on an order. Missing parts are skipped.
    pub fn composed(&self) -> String {
        [&self.province, &self.city, &self.district, &self.detail_address]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect::<String>()
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub sales: i64,
}

//--------------------------------------    PaymentRecord      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentRecordStatus::Pending => write!(f, "pending"),
            PaymentRecordStatus::Confirmed => write!(f, "confirmed"),
            PaymentRecordStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The bookkeeping entry created when an order is settled. There is at most one per order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub order_id: i64,
    pub order_no: OrderNo,
    pub method: PaymentMethod,
    pub status: PaymentRecordStatus,
    pub expected_amount: Money,
    pub actual_amount: Option<Money>,
    pub transaction_id: Option<String>,
    pub collector_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub order_id: i64,
    pub order_no: OrderNo,
    pub method: PaymentMethod,
    pub status: PaymentRecordStatus,
    pub expected_amount: Money,
    pub actual_amount: Option<Money>,
}

impl NewPaymentRecord {
    pub fn pending(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_no: order.order_no.clone(),
            method: order.payment_method,
            status: PaymentRecordStatus::Pending,
            expected_amount: order.total_amount,
            actual_amount: None,
        }
    }

    pub fn confirmed(order: &Order) -> Self {
        Self {
            status: PaymentRecordStatus::Confirmed,
            actual_amount: Some(order.total_amount),
            ..Self::pending(order)
        }
    }
}
