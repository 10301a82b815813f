use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, OrderNo};

/// What the engine asks the gateway for when an electronic order is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepayRequest {
    pub order_no: OrderNo,
    pub amount: Money,
    pub description: String,
    pub callback_url: String,
}

/// Client-side parameters returned by the gateway. The client hands these to the gateway's SDK to complete payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayParams {
    pub app_id: String,
    pub time_stamp: String,
    pub nonce_str: String,
    pub package: String,
    pub sign_type: String,
    pub pay_sign: String,
}

/// A verified, parsed gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_no: OrderNo,
    pub transaction_id: String,
    pub amount: Money,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    #[error("The payment gateway is not configured: {0}")]
    NotConfigured(String),
    #[error("The gateway notification could not be understood: {0}")]
    InvalidNotification(String),
    #[error("The payment gateway refused the request: {0}")]
    Upstream(String),
}

/// The external payment gateway.
///
/// Only the callback contract matters to the engine: how prepay parameters are produced and how a callback body is
/// turned into a [`GatewayNotification`].
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    async fn prepay(&self, request: PrepayRequest) -> Result<GatewayParams, PaymentGatewayError>;

    /// Parses a raw callback body. Signature checks on the transport happen before this is called.
    fn parse_notification(&self, body: &[u8]) -> Result<GatewayNotification, PaymentGatewayError>;

    /// The protocol-specific acknowledgement the gateway expects in reply to a callback.
    fn acknowledgement(&self, accepted: bool) -> String;
}
