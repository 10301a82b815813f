use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fdg_common::Money;
use fresh_delivery_engine::{
    db_types::{DeliveryType, OrderStatusType, PaymentMethod},
    order_objects::{NewOrderLine, NewOrderRequest, OrderQueryFilter, Paging, DEFAULT_PAGE_SIZE},
};
use serde::{Deserialize, Serialize};

pub const SUCCESS_CODE: i32 = 200;

/// The uniform response envelope. `data` is `null` for failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { code: SUCCESS_CODE, message: "success".into(), data: Some(data) }
    }

    pub fn failure<S: Display>(code: i32, message: S) -> Self {
        Self { code, message: message.to_string(), data: None }
    }
}

/// Body of `POST /order/create`. The user comes from the caller's identity, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderParams {
    pub address_id: i64,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub remark: Option<String>,
}

impl CreateOrderParams {
    pub fn into_request(self, user_id: i64) -> NewOrderRequest {
        NewOrderRequest {
            user_id,
            address_id: self.address_id,
            lines: self.lines,
            delivery_type: self.delivery_type,
            payment_method: self.payment_method,
            remark: self.remark,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatusType>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl OrderListParams {
    pub fn paging(&self) -> Result<Paging, String> {
        Paging::new(self.page.unwrap_or(1), self.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipOrderParams {
    pub company: String,
    pub tracking_no: String,
}

/// A courier's report of the cash collected for a cash-on-delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashConfirmationParams {
    pub actual_amount: Money,
    /// Defaults to the caller
    #[serde(default)]
    pub collector_id: Option<i64>,
}

/// Query string of the admin order search. `status` is a comma-separated list, e.g. `status=completed,refunded`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub order_no: Option<String>,
    pub user_id: Option<i64>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl OrderSearchParams {
    pub fn paging(&self) -> Result<Paging, String> {
        Paging::new(self.page.unwrap_or(1), self.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = String;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter::default();
        if let Some(order_no) = params.order_no.filter(|s| !s.trim().is_empty()) {
            filter = filter.with_order_no(order_no.trim());
        }
        if let Some(user_id) = params.user_id {
            filter = filter.with_user_id(user_id);
        }
        if let Some(statuses) = params.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = OrderStatusType::from_str(s).map_err(|e| e.to_string())?;
                filter = filter.with_status(status);
            }
        }
        if let Some(since) = params.since {
            filter = filter.since(since);
        }
        if let Some(until) = params.until {
            filter = filter.until(until);
        }
        Ok(filter)
    }
}
