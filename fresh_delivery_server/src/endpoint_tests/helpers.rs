use actix_web::{
    body::MessageBody,
    http::{Method, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use fresh_delivery_engine::db_types::{
    DeliveryType,
    Money,
    Order,
    OrderNo,
    OrderStatusType,
    PayStatus,
    PaymentMethod,
};
use log::debug;
use serde_json::Value;

use crate::{
    auth::{Role, USER_ID_HEADER, USER_ROLE_HEADER},
    server::configure_extractors,
};

pub const ORDER_NO: &str = "FD2024061512000100014821";

/// Sends a single request through a fresh app built by `configure`. Errors raised by middleware are rendered the same
/// way the running server renders them.
pub async fn send_request(
    method: Method,
    path: &str,
    caller: Option<(i64, Role)>,
    body: Option<Value>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = TestRequest::default().method(method).uri(path);
    if let Some((user_id, role)) = caller {
        req = req.insert_header((USER_ID_HEADER, user_id.to_string())).insert_header((USER_ROLE_HEADER, role.to_string()));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    let app = App::new().configure(configure_extractors).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request to {path}");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn envelope(body: &str) -> Value {
    serde_json::from_str(body).expect("Response was not JSON")
}

pub fn sample_order(id: i64, user_id: i64, status: OrderStatusType, method: PaymentMethod) -> Order {
    let created = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 1).unwrap();
    Order {
        id,
        order_no: OrderNo::from(ORDER_NO),
        user_id,
        subtotal: Money::from_units(17),
        delivery_fee: Money::from_units(5),
        total_amount: Money::from_units(22),
        pay_amount: None,
        payment_method: method,
        pay_status: PayStatus::Unpaid,
        status,
        delivery_type: DeliveryType::Standard,
        receiver_name: "Ada".into(),
        receiver_phone: "13800000000".into(),
        receiver_address: "Xuhui, Shanghai, 12 Orchard Lane".into(),
        remark: None,
        cancel_reason: None,
        refund_reason: None,
        shipping_company: None,
        tracking_no: None,
        created_at: created,
        updated_at: created,
        paid_at: None,
        shipped_at: None,
        confirmed_at: None,
        cancelled_at: None,
        finished_at: None,
        is_deleted: false,
    }
}
