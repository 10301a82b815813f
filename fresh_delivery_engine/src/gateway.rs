//! The bundled [`PaymentGateway`] implementation.
//!
//! Client payment parameters are signed with HMAC-SHA256 over the canonical
//! `appId=…&nonceStr=…&package=…&signType=…&timeStamp=…` string using the merchant API key.
//!
//! Callbacks arrive as JSON:
//!
//! ```json
//! { "merchant_id": "1900000109", "order_no": "FD2024061512000100014821", "transaction_id": "4200001234",
//!   "amount": "22.00", "result": "SUCCESS" }
//! ```
//!
//! The transport signature (`X-Gateway-Signature`) is checked by the HTTP layer before the body gets here.
use chrono::Utc;
use fdg_common::Secret;
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;

use crate::{
    db_types::{Money, OrderNo},
    helpers::{calculate_hmac, is_valid_order_number},
    traits::{GatewayNotification, GatewayParams, PaymentGateway, PaymentGatewayError, PrepayRequest},
};

pub const SIGN_TYPE: &str = "HMAC-SHA256";
const NONCE_LENGTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub app_id: String,
    pub merchant_id: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct SignedPaymentGateway {
    config: GatewayConfig,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(default)]
    merchant_id: Option<String>,
    order_no: String,
    transaction_id: String,
    amount: Money,
    result: String,
}

impl SignedPaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn check_configured(&self) -> Result<(), PaymentGatewayError> {
        if self.config.app_id.is_empty() {
            return Err(PaymentGatewayError::NotConfigured("No gateway app id has been set".into()));
        }
        if self.config.api_key.reveal().is_empty() {
            return Err(PaymentGatewayError::NotConfigured("No gateway API key has been set".into()));
        }
        Ok(())
    }

    /// The prepay id the client SDK uses to look up the transaction. It is bound to the merchant, order and amount.
    fn prepay_id(&self, request: &PrepayRequest) -> String {
        let material = format!("{}|{}|{}", self.config.merchant_id, request.order_no.as_str(), request.amount.value());
        let digest = calculate_hmac(self.config.api_key.reveal(), material.as_bytes());
        let id = digest.chars().filter(|c| c.is_ascii_alphanumeric()).take(24).collect::<String>();
        format!("fd{id}")
    }

    pub fn sign_params(&self, app_id: &str, time_stamp: &str, nonce_str: &str, package: &str) -> String {
        let canonical = format!("appId={app_id}&nonceStr={nonce_str}&package={package}&signType={SIGN_TYPE}&timeStamp={time_stamp}");
        calculate_hmac(self.config.api_key.reveal(), canonical.as_bytes())
    }
}

impl PaymentGateway for SignedPaymentGateway {
    async fn prepay(&self, request: PrepayRequest) -> Result<GatewayParams, PaymentGatewayError> {
        self.check_configured()?;
        let time_stamp = Utc::now().timestamp().to_string();
        let nonce_str = rand::thread_rng().sample_iter(&Alphanumeric).take(NONCE_LENGTH).map(char::from).collect::<String>();
        let package = format!("prepay_id={}", self.prepay_id(&request));
        let pay_sign = self.sign_params(&self.config.app_id, &time_stamp, &nonce_str, &package);
        trace!("💰️ Prepay parameters signed for {} ({}), callback {}", request.order_no, request.amount, request.callback_url);
        Ok(GatewayParams {
            app_id: self.config.app_id.clone(),
            time_stamp,
            nonce_str,
            package,
            sign_type: SIGN_TYPE.to_string(),
            pay_sign,
        })
    }

    fn parse_notification(&self, body: &[u8]) -> Result<GatewayNotification, PaymentGatewayError> {
        let body: CallbackBody =
            serde_json::from_slice(body).map_err(|e| PaymentGatewayError::InvalidNotification(e.to_string()))?;
        if let Some(merchant) = &body.merchant_id {
            if !self.config.merchant_id.is_empty() && merchant != &self.config.merchant_id {
                return Err(PaymentGatewayError::InvalidNotification(format!("Unknown merchant id {merchant}")));
            }
        }
        if !is_valid_order_number(&body.order_no) {
            return Err(PaymentGatewayError::InvalidNotification(format!("Malformed order number {}", body.order_no)));
        }
        if body.transaction_id.trim().is_empty() {
            return Err(PaymentGatewayError::InvalidNotification("Missing transaction id".into()));
        }
        Ok(GatewayNotification {
            order_no: OrderNo(body.order_no),
            transaction_id: body.transaction_id.trim().to_string(),
            amount: body.amount,
            success: body.result.eq_ignore_ascii_case("SUCCESS"),
        })
    }

    fn acknowledgement(&self, accepted: bool) -> String {
        let (code, msg) = if accepted { ("SUCCESS", "OK") } else { ("FAIL", "ERROR") };
        format!("<xml><return_code><![CDATA[{code}]]></return_code><return_msg><![CDATA[{msg}]]></return_msg></xml>")
    }
}
