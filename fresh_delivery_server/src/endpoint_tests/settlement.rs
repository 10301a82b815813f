use actix_web::{
    http::{Method, StatusCode},
    web,
    web::ServiceConfig,
};
use chrono::Utc;
use fdg_common::Secret;
use fresh_delivery_engine::{
    db_types::{Money, Order, OrderStatusType, PayStatus, PaymentMethod, PaymentRecord, PaymentRecordStatus},
    events::EventProducers,
    helpers::calculate_hmac,
    traits::GatewayPaymentOutcome,
    GatewayConfig,
    SettlementApi,
    SignedPaymentGateway,
};
use serde_json::json;

use super::{
    helpers::{envelope, sample_order, send_request, ORDER_NO},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    middleware::{HmacMiddlewareFactory, SIGNATURE_HEADER},
    routes::{ConfirmCashPaymentRoute, PayOrderRoute, PaymentNotifyRoute, PaymentStatusRoute},
};

const API_KEY: &str = "test-gateway-key";

type Settlement = SettlementApi<MockBackend, SignedPaymentGateway>;

fn gateway() -> SignedPaymentGateway {
    SignedPaymentGateway::new(GatewayConfig {
        app_id: "wx-app".into(),
        merchant_id: "1900000109".into(),
        api_key: Secret::new(API_KEY.to_string()),
    })
}

fn settlement(db: MockBackend) -> web::Data<Settlement> {
    web::Data::new(SettlementApi::new(db, gateway(), EventProducers::default(), "http://localhost/pay/notify"))
}

fn payment_record(order: &Order, status: PaymentRecordStatus) -> PaymentRecord {
    PaymentRecord {
        id: 1,
        order_id: order.id,
        order_no: order.order_no.clone(),
        method: order.payment_method,
        status,
        expected_amount: order.total_amount,
        actual_amount: None,
        transaction_id: None,
        collector_id: None,
        created_at: order.created_at,
        updated_at: order.created_at,
        confirmed_at: None,
    }
}

fn paid(mut order: Order) -> Order {
    order.status = OrderStatusType::AwaitingShipment;
    order.pay_status = PayStatus::Paid;
    order.pay_amount = Some(order.total_amount);
    order.paid_at = Some(Utc::now());
    order
}

#[actix_web::test]
async fn pay_cash_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))));
    db.expect_settle_cash_order().times(1).returning(|id| {
        let order = paid(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash));
        let record = payment_record(&order, PaymentRecordStatus::Confirmed);
        Ok((order, record))
    });
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(PayOrderRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/5/pay", Some((1, Role::User)), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["method"], "cash");
    assert_eq!(body["data"]["order"]["status"], "awaiting_shipment");
    assert_eq!(body["data"]["record"]["status"], "confirmed");
}

#[actix_web::test]
async fn pay_electronic_order_returns_signed_parameters() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Electronic))));
    db.expect_record_pending_gateway_payment().times(1).returning(|id| {
        let order = sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Electronic);
        Ok(payment_record(&order, PaymentRecordStatus::Pending))
    });
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(PayOrderRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/5/pay", Some((1, Role::User)), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["method"], "electronic");
    assert_eq!(body["data"]["order_no"], ORDER_NO);
    assert_eq!(body["data"]["params"]["appId"], "wx-app");
    assert!(body["data"]["params"]["package"].as_str().unwrap().starts_with("prepay_id="));
}

#[actix_web::test]
async fn pay_someone_elses_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 2, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))));
    db.expect_settle_cash_order().never();
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(PayOrderRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/5/pay", Some((1, Role::User)), None, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope(&body)["code"], 403);
}

#[actix_web::test]
async fn pay_an_order_twice() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id().returning(|id| {
        Ok(Some(paid(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))))
    });
    db.expect_settle_cash_order().never();
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(PayOrderRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/5/pay", Some((1, Role::User)), None, configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(envelope(&body)["code"], 7002);
}

#[actix_web::test]
async fn confirm_cash_payment_requires_a_courier() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_cash_on_delivery().never();
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(ConfirmCashPaymentRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let body = json!({"actual_amount": "22.00"});
    let (status, body) =
        send_request(Method::POST, "/order/5/confirm-cash-payment", Some((1, Role::User)), Some(body), configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope(&body)["code"], 403);
}

#[actix_web::test]
async fn courier_confirms_cash_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_cash_on_delivery()
        .withf(|id, amount, collector| *id == 5 && *amount == Money::from_cents(2150) && *collector == 7)
        .times(1)
        .returning(|id, amount, collector| {
            let mut order = sample_order(id, 1, OrderStatusType::Completed, PaymentMethod::CashOnDelivery);
            order.pay_status = PayStatus::Paid;
            order.pay_amount = Some(amount);
            let mut record = payment_record(&order, PaymentRecordStatus::Confirmed);
            record.actual_amount = Some(amount);
            record.collector_id = Some(collector);
            Ok((order, record))
        });
    let api = settlement(db);
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(ConfirmCashPaymentRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
    };
    let body = json!({"actual_amount": "21.50"});
    let (status, body) =
        send_request(Method::POST, "/order/5/confirm-cash-payment", Some((7, Role::Courier)), Some(body), configure)
            .await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["order"]["status"], "completed");
    assert_eq!(body["data"]["record"]["expected_amount"], "22.00");
    assert_eq!(body["data"]["record"]["actual_amount"], "21.50");
    assert_eq!(body["data"]["record"]["collector_id"], 7);
}

fn notify_app(db: MockBackend, key: &str) -> impl FnOnce(&mut ServiceConfig) {
    let api = settlement(db);
    let key = Secret::new(key.to_string());
    move |cfg: &mut ServiceConfig| {
        cfg.service(
            web::scope("/pay/notify")
                .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, key, true))
                .service(PaymentNotifyRoute::<MockBackend, SignedPaymentGateway>::new()),
        )
        .app_data(api);
    }
}

async fn notify(body: &str, signature: &str, db: MockBackend) -> (StatusCode, String) {
    notify_with_key(body, signature, db, API_KEY).await
}

async fn notify_with_key(body: &str, signature: &str, db: MockBackend, key: &str) -> (StatusCode, String) {
    use actix_web::{body::MessageBody, test, test::TestRequest, App};

    let req = TestRequest::post()
        .uri("/pay/notify")
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
        .to_request();
    let service = test::init_service(App::new().configure(notify_app(db, key))).await;
    let res = match test::try_call_service(&service, req).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = res.into_body().try_into_bytes().unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

fn callback_body(result: &str) -> String {
    json!({
        "merchant_id": "1900000109",
        "order_no": ORDER_NO,
        "transaction_id": "4200001234",
        "amount": "22.00",
        "result": result,
    })
    .to_string()
}

#[actix_web::test]
async fn signed_notification_marks_the_order_paid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment()
        .withf(|n| n.transaction_id == "4200001234" && n.amount == Money::from_units(22) && n.success)
        .times(1)
        .returning(|_| {
            let order = paid(sample_order(5, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Electronic));
            Ok(GatewayPaymentOutcome::Applied(order))
        });
    let body = callback_body("SUCCESS");
    let signature = calculate_hmac(API_KEY, body.as_bytes());
    let (status, reply) = notify(&body, &signature, db).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("<return_code><![CDATA[SUCCESS]]></return_code>"));
}

#[actix_web::test]
async fn repeated_notification_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment().returning(|_| {
        let order = paid(sample_order(5, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Electronic));
        Ok(GatewayPaymentOutcome::AlreadyApplied(order))
    });
    let body = callback_body("SUCCESS");
    let signature = calculate_hmac(API_KEY, body.as_bytes());
    let (status, reply) = notify(&body, &signature, db).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("SUCCESS"));
}

#[actix_web::test]
async fn declined_notification_leaves_the_order_alone() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment().never();
    let body = callback_body("FAIL");
    let signature = calculate_hmac(API_KEY, body.as_bytes());
    let (status, reply) = notify(&body, &signature, db).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("SUCCESS"));
}

#[actix_web::test]
async fn notification_with_a_bad_signature() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment().never();
    let body = callback_body("SUCCESS");
    let signature = calculate_hmac("not-the-key", body.as_bytes());
    let (status, _) = notify(&body, &signature, db).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn notification_is_refused_without_a_signing_key() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment().never();
    let body = callback_body("SUCCESS");
    let signature = calculate_hmac("", body.as_bytes());
    let (status, _) = notify_with_key(&body, &signature, db, "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_notification_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_gateway_payment().never();
    let body = r#"{"order_no": "not-an-order", "transaction_id": "1", "amount": "1.00", "result": "SUCCESS"}"#;
    let signature = calculate_hmac(API_KEY, body.as_bytes());
    let (status, reply) = notify(body, &signature, db).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply.contains("<return_code><![CDATA[FAIL]]></return_code>"));
}

#[actix_web::test]
async fn payment_status_visibility() {
    let _ = env_logger::try_init().ok();
    let path = format!("/pay/status/{ORDER_NO}");
    for (caller, expected) in [
        (Some((1, Role::User)), StatusCode::OK),
        (Some((2, Role::User)), StatusCode::FORBIDDEN),
        (Some((99, Role::Admin)), StatusCode::OK),
    ] {
        let mut db = MockBackend::new();
        db.expect_fetch_order_by_order_no().returning(|_| {
            Ok(Some(paid(sample_order(5, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Electronic))))
        });
        db.expect_fetch_payment_record().returning(|id| {
            let order = sample_order(id, 1, OrderStatusType::AwaitingShipment, PaymentMethod::Electronic);
            Ok(Some(payment_record(&order, PaymentRecordStatus::Confirmed)))
        });
        let api = settlement(db);
        let configure = move |cfg: &mut ServiceConfig| {
            cfg.service(PaymentStatusRoute::<MockBackend, SignedPaymentGateway>::new()).app_data(api);
        };
        let (status, body) = send_request(Method::GET, &path, caller, None, configure).await;
        assert_eq!(status, expected);
        if status == StatusCode::OK {
            let body = envelope(&body);
            assert_eq!(body["data"]["pay_status"], "paid");
            assert_eq!(body["data"]["record"]["status"], "confirmed");
        }
    }
}
