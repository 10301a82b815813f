use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryType, Money, Order, OrderItem, OrderNo, OrderStatusType, PaymentMethod};

pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

//--------------------------------------   Order creation    ---------------------------------------------------------

/// One line of a new order, as selected from the user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewOrderLine {
    pub fn new<S: Into<String>>(product_id: i64, name: S, unit_price: Money, quantity: i64) -> Self {
        Self { product_id, quantity, unit_price, name: name.into(), image: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub user_id: i64,
    pub address_id: i64,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub remark: Option<String>,
}

/// The result of a successful order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: i64,
    pub order_no: OrderNo,
    pub total_amount: Money,
}

impl From<&Order> for OrderCreated {
    fn from(order: &Order) -> Self {
        Self { order_id: order.id, order_no: order.order_no.clone(), total_amount: order.total_amount }
    }
}

//--------------------------------------      Queries        ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A validated page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Paging {
    /// Builds a page request, rejecting `page < 1` and page sizes outside `1..=100`.
    pub fn new(page: i64, page_size: i64) -> Result<Self, String> {
        if page < 1 {
            return Err(format!("page must be at least 1, got {page}"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(format!("page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(list: Vec<T>, total: i64, paging: Paging) -> Self {
        let has_more = paging.offset() + (list.len() as i64) < total;
        Self { list, total, page: paging.page, page_size: paging.page_size, has_more }
    }
}

/// How many of a user's orders sit in each active state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub awaiting_payment: i64,
    pub awaiting_shipment: i64,
    pub awaiting_receipt: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    /// Matches any order number containing this fragment
    pub order_no: Option<String>,
    pub user_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_order_no<S: Into<String>>(mut self, fragment: S) -> Self {
        self.order_no = Some(fragment.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_no.is_none() &&
            self.user_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_no) = &self.order_no {
            write!(f, "order_no: {order_no}. ")?;
        }
        if let Some(user_id) = &self.user_id {
            write!(f, "user_id: {user_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}
