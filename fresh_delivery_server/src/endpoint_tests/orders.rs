use actix_web::{
    body::MessageBody,
    http::{Method, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use fresh_delivery_engine::{
    db_types::{Address, Money, OrderStatusType, PaymentMethod},
    events::EventProducers,
    order_objects::Paging,
    traits::OrderGatewayError,
    OrderFlowApi,
    PricingPolicy,
    PricingPolicyHandle,
    QueryApi,
    DEFAULT_EXPEDITED_DELIVERY_FEE,
    DEFAULT_STANDARD_DELIVERY_FEE,
};
use serde_json::json;

use super::{
    helpers::{envelope, sample_order, send_request, ORDER_NO},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    routes::{
        health,
        AdminConfirmReceiptRoute,
        CancelMyOrderRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        MyOrderRoute,
        MyOrdersRoute,
        OrdersSearchRoute,
        PricingPolicyRoute,
        ResetPricingPolicyRoute,
        ShipOrderRoute,
        UpdatePricingPolicyRoute,
    },
};

const USER: Option<(i64, Role)> = Some((1, Role::User));
const ADMIN: Option<(i64, Role)> = Some((99, Role::Admin));

fn pricing() -> PricingPolicyHandle {
    PricingPolicyHandle::new(PricingPolicy::new(Money::from_units(5), Money::from_units(12)))
}

fn order_flow(db: MockBackend, pricing: PricingPolicyHandle) -> web::Data<OrderFlowApi<MockBackend>> {
    web::Data::new(OrderFlowApi::new(db, EventProducers::default(), pricing))
}

fn home_address(user_id: i64) -> Address {
    Address {
        id: 3,
        user_id,
        receiver_name: "Ada".into(),
        receiver_phone: "13800000000".into(),
        province: Some("Shanghai".into()),
        city: None,
        district: Some("Xuhui".into()),
        detail_address: Some("12 Orchard Lane".into()),
        is_deleted: false,
    }
}

fn create_order_body() -> serde_json::Value {
    json!({
        "address_id": 3,
        "lines": [{"product_id": 1, "name": "Apples", "unit_price": "8.50", "quantity": 2}],
        "payment_method": "cash",
    })
}

#[actix_web::test]
async fn health_endpoint() {
    let app = test::init_service(App::new().service(health)).await;
    let req = TestRequest::get().uri("/health").to_request();
    let (_req, res) = test::call_service(&app, req).await.into_parts();
    let status = res.status();
    let body = res.into_body().try_into_bytes().unwrap();
    assert!(status.is_success());
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn my_orders_without_identity() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        cfg.service(MyOrdersRoute::<MockBackend>::new()).app_data(web::Data::new(QueryApi::new(MockBackend::new())));
    };
    let (status, body) = send_request(Method::GET, "/order/list", None, None, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = envelope(&body);
    assert_eq!(body["code"], 401);
    assert!(body["data"].is_null());
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_address().returning(|_| Ok(Some(home_address(1))));
    db.expect_insert_order_with_items()
        .withf(|order, items| {
            order.user_id == 1 &&
                order.subtotal == Money::from_units(17) &&
                order.delivery_fee == Money::from_units(5) &&
                order.total_amount == Money::from_units(22) &&
                order.payment_method == PaymentMethod::Cash &&
                order.receiver_address == "ShanghaiXuhui12 Orchard Lane" &&
                items.len() == 1
        })
        .times(1)
        .returning(|_, _| Ok(sample_order(5, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash)));
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CreateOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/create", USER, Some(create_order_body()), configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"]["order_id"], 5);
    assert_eq!(body["data"]["order_no"], ORDER_NO);
    assert_eq!(body["data"]["total_amount"], "22.00");
}

#[actix_web::test]
async fn create_order_with_insufficient_stock() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_address().returning(|_| Ok(Some(home_address(1))));
    db.expect_insert_order_with_items()
        .returning(|_, _| Err(OrderGatewayError::InsufficientStock { product_id: 1, requested: 2, available: 1 }));
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CreateOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/create", USER, Some(create_order_body()), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let body = envelope(&body);
    assert_eq!(body["code"], 6003);
    assert!(body["message"].as_str().unwrap().contains("Only 1 left in stock"));
}

#[actix_web::test]
async fn create_order_with_someone_elses_address() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_address().returning(|_| Ok(Some(home_address(2))));
    db.expect_insert_order_with_items().never();
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CreateOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::POST, "/order/create", USER, Some(create_order_body()), configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope(&body)["code"], 8001);
}

#[actix_web::test]
async fn create_order_with_malformed_body() {
    let _ = env_logger::try_init().ok();
    let api = order_flow(MockBackend::new(), pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CreateOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let body = json!({"address_id": 3, "lines": "apples"});
    let (status, body) = send_request(Method::POST, "/order/create", USER, Some(body), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope(&body)["code"], 400);
}

#[actix_web::test]
async fn fetch_my_orders_page() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_orders_for_user()
        .withf(|user_id, status, paging| {
            *user_id == 1 && *status == Some(OrderStatusType::Completed) && *paging == Paging::new(2, 5).unwrap()
        })
        .returning(|_, _, _| Ok((vec![sample_order(5, 1, OrderStatusType::Completed, PaymentMethod::Cash)], 6)));
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(MyOrdersRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) =
        send_request(Method::GET, "/order/list?status=completed&page=2&size=5", USER, None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["total"], 6);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["list"][0]["status"], "completed");
}

#[actix_web::test]
async fn fetch_my_orders_with_oversized_page() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_orders_for_user().never();
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(MyOrdersRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::GET, "/order/list?size=500", USER, None, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope(&body)["code"], 400);
}

#[actix_web::test]
async fn fetch_another_users_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 2, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))));
    db.expect_fetch_order_items().never();
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(MyOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::GET, "/order/5", USER, None, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope(&body)["code"], 403);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id().returning(|_| Ok(None));
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(MyOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::GET, "/order/404", USER, None, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(envelope(&body)["code"], 7001);
}

#[actix_web::test]
async fn cancel_my_order_without_a_reason() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))));
    db.expect_cancel_order().withf(|id, reason| *id == 5 && !reason.trim().is_empty()).times(1).returning(
        |id, reason| {
            let mut order = sample_order(id, 1, OrderStatusType::Cancelled, PaymentMethod::Cash);
            order.cancel_reason = Some(reason.to_string());
            Ok(order)
        },
    );
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CancelMyOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::PUT, "/order/5/cancel", USER, None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["status"], "cancelled");
    assert!(body["data"]["cancel_reason"].is_string());
}

#[actix_web::test]
async fn cancel_an_order_that_moved_on() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id()
        .returning(|id| Ok(Some(sample_order(id, 1, OrderStatusType::AwaitingPayment, PaymentMethod::Cash))));
    db.expect_cancel_order().returning(|_, _| Err(OrderGatewayError::ConcurrentModification(ORDER_NO.into())));
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CancelMyOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let body = json!({"reason": "Changed my mind"});
    let (status, body) = send_request(Method::PUT, "/order/5/cancel", USER, Some(body), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(envelope(&body)["code"], 7002);
}

#[actix_web::test]
async fn admin_routes_reject_other_roles() {
    let _ = env_logger::try_init().ok();
    for (caller, expected) in [
        (None, StatusCode::UNAUTHORIZED),
        (USER, StatusCode::FORBIDDEN),
        (Some((7, Role::Courier)), StatusCode::FORBIDDEN),
    ] {
        let mut db = MockBackend::new();
        db.expect_ship_order().never();
        let api = order_flow(db, pricing());
        let configure = move |cfg: &mut ServiceConfig| {
            cfg.service(ShipOrderRoute::<MockBackend>::new()).app_data(api);
        };
        let body = json!({"company": "SF Express", "tracking_no": "SF1234567890"});
        let (status, _) = send_request(Method::PUT, "/admin/order/5/ship", caller, Some(body), configure).await;
        assert_eq!(status, expected);
    }
}

#[actix_web::test]
async fn admin_ships_an_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_ship_order()
        .withf(|id, company, tracking| *id == 5 && company.to_string() == "SF Express" && tracking.to_string() == "SF1")
        .returning(|id, company, tracking| {
            let mut order = sample_order(id, 1, OrderStatusType::AwaitingReceipt, PaymentMethod::Cash);
            order.shipping_company = Some(company.to_string());
            order.tracking_no = Some(tracking.to_string());
            Ok(order)
        });
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(ShipOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let body = json!({"company": "SF Express", "tracking_no": "SF1"});
    let (status, body) = send_request(Method::PUT, "/admin/order/5/ship", ADMIN, Some(body), configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["status"], "awaiting_receipt");
    assert_eq!(body["data"]["tracking_no"], "SF1");
}

#[actix_web::test]
async fn admin_confirms_receipt_for_the_customer() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_id().never();
    db.expect_confirm_receipt().withf(|id| *id == 5).times(1).returning(|id| {
        let mut order = sample_order(id, 1, OrderStatusType::Completed, PaymentMethod::Cash);
        order.finished_at = Some(order.created_at);
        Ok(order)
    });
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(AdminConfirmReceiptRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::PUT, "/admin/order/5/confirm", ADMIN, None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["user_id"], 1);
}

#[actix_web::test]
async fn customers_cannot_use_admin_confirm() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_confirm_receipt().never();
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(AdminConfirmReceiptRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, _) = send_request(Method::PUT, "/admin/order/5/confirm", USER, None, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn admin_search_is_paged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_search_orders()
        .withf(|filter, paging| {
            filter.order_no.as_deref() == Some("2024_06")
                && filter.status == Some(vec![OrderStatusType::Completed])
                && *paging == Paging::new(2, 1).unwrap()
        })
        .times(1)
        .returning(|_, _| Ok((vec![sample_order(5, 1, OrderStatusType::Completed, PaymentMethod::Cash)], 3)));
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(OrdersSearchRoute::<MockBackend>::new()).app_data(api);
    };
    let uri = "/admin/order/search?order_no=2024_06&status=completed&page=2&size=1";
    let (status, body) = send_request(Method::GET, uri, ADMIN, None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["has_more"], true);
    assert_eq!(body["data"]["list"][0]["order_no"], ORDER_NO);
}

#[actix_web::test]
async fn admin_search_rejects_bad_paging() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_search_orders().never();
    let api = web::Data::new(QueryApi::new(db));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(OrdersSearchRoute::<MockBackend>::new()).app_data(api);
    };
    let (status, body) = send_request(Method::GET, "/admin/order/search?size=101", ADMIN, None, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope(&body)["code"], 400);
}

#[actix_web::test]
async fn admin_cancel_needs_a_reason() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_cancel_order().never();
    let api = order_flow(db, pricing());
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.service(CancelOrderRoute::<MockBackend>::new()).app_data(api);
    };
    let body = json!({"reason": "   "});
    let (status, body) = send_request(Method::PUT, "/admin/order/5/cancel", ADMIN, Some(body), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope(&body)["code"], 400);
}

#[actix_web::test]
async fn update_and_reset_pricing() {
    let _ = env_logger::try_init().ok();
    let handle = pricing();
    let configure = |handle: PricingPolicyHandle| {
        move |cfg: &mut ServiceConfig| {
            cfg.service(PricingPolicyRoute::<MockBackend>::new())
                .service(UpdatePricingPolicyRoute::<MockBackend>::new())
                .service(ResetPricingPolicyRoute::<MockBackend>::new())
                .app_data(order_flow(MockBackend::new(), handle));
        }
    };

    let body = json!({"standard_fee": "0.00", "expedited_fee": "15.50"});
    let (status, body) = send_request(Method::PUT, "/admin/pricing", ADMIN, Some(body), configure(handle.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope(&body)["data"]["expedited_fee"], "15.50");
    assert_eq!(handle.current(), PricingPolicy::new(Money::zero(), Money::from_cents(1550)));

    let body = json!({"standard_fee": "-1.00", "expedited_fee": "15.50"});
    let (status, _) = send_request(Method::PUT, "/admin/pricing", ADMIN, Some(body), configure(handle.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(handle.current().expedited_fee, Money::from_cents(1550));

    let (status, body) = send_request(Method::DELETE, "/admin/pricing", ADMIN, None, configure(handle.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body = envelope(&body);
    assert_eq!(body["data"]["standard_fee"], DEFAULT_STANDARD_DELIVERY_FEE.to_string());
    assert_eq!(body["data"]["expedited_fee"], DEFAULT_EXPEDITED_DELIVERY_FEE.to_string());

    let (status, _) = send_request(Method::GET, "/admin/pricing", USER, None, configure(handle.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
