//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
//!
//! Every JSON response is wrapped in the `{code, message, data}` envelope, see [`ApiResponse`]. The only exception is
//! the payment callback, which answers in the format the gateway expects.
use actix_web::{get, http::StatusCode, web, HttpResponse, Responder, ResponseError};
use fresh_delivery_engine::{
    db_types::OrderNo,
    order_objects::OrderQueryFilter,
    settlement_objects::NotificationOutcome,
    traits::{OrderManagement, PaymentGateway},
    OrderFlowApi,
    OrderGatewayDatabase,
    PricingPolicy,
    QueryApi,
    SettlementApi,
};
use log::*;
use serde::Serialize;

use crate::{
    auth::{Caller, Role},
    data_objects::{
        ApiResponse,
        CancelOrderParams,
        CashConfirmationParams,
        CreateOrderParams,
        OrderListParams,
        OrderSearchParams,
        ReasonParams,
        ShipOrderParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn ok_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(data))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/order/create" impl OrderGatewayDatabase);
/// Route handler for `POST /order/create`
///
/// Turns the caller's cart selection into an order. The response carries the new order's id, order number and total.
/// Stock for every line is reserved as part of the same transaction, so a failure here (e.g. insufficient stock)
/// leaves nothing behind.
pub async fn create_order<B: OrderGatewayDatabase>(
    caller: Caller,
    body: web::Json<CreateOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create order for user #{}", caller.user_id);
    let request = body.into_inner().into_request(caller.user_id);
    let created = api.create_order(request).await?;
    Ok(ok_json(created))
}

route!(my_orders => Get "/order/list" impl OrderManagement);
/// Route handler for `GET /order/list?status&page&size`
///
/// A page of the caller's own orders, newest first. `page` starts at 1 and `size` must be between 1 and 100.
pub async fn my_orders<B: OrderManagement>(
    caller: Caller,
    query: web::Query<OrderListParams>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET order list for user #{}", caller.user_id);
    let paging = query.paging().map_err(ServerError::InvalidQuery)?;
    let page = api.list_orders(caller.user_id, query.status, paging).await?;
    Ok(ok_json(page))
}

route!(my_order_stats => Get "/order/stats" impl OrderManagement);
pub async fn my_order_stats<B: OrderManagement>(
    caller: Caller,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET order stats for user #{}", caller.user_id);
    let stats = api.order_stats(caller.user_id).await?;
    Ok(ok_json(stats))
}

route!(my_order => Get "/order/{id}" impl OrderManagement);
/// Route handler for `GET /order/{id}`
///
/// Fetches one of the caller's orders with its items. Orders that belong to someone else are forbidden.
pub async fn my_order<B: OrderManagement>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for user #{}", caller.user_id);
    let order = api.order_for_user(caller.user_id, order_id).await?;
    Ok(ok_json(order))
}

route!(cancel_my_order => Put "/order/{id}/cancel" impl OrderGatewayDatabase);
/// Route handler for `PUT /order/{id}/cancel`
///
/// The body, `{"reason": "..."}`, is optional. Only orders that have not shipped yet can be cancelled.
pub async fn cancel_my_order<B: OrderGatewayDatabase>(
    caller: Caller,
    path: web::Path<i64>,
    body: Option<web::Json<CancelOrderParams>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT cancel order {order_id} for user #{}", caller.user_id);
    let reason = body.and_then(|b| b.into_inner().reason);
    let order = api.cancel_order_for_user(caller.user_id, order_id, reason).await?;
    Ok(ok_json(order))
}

route!(confirm_receipt => Put "/order/{id}/confirm" impl OrderGatewayDatabase);
pub async fn confirm_receipt<B: OrderGatewayDatabase>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT confirm receipt of order {order_id} for user #{}", caller.user_id);
    let order = api.confirm_receipt(caller.user_id, order_id).await?;
    Ok(ok_json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(pay_order => Post "/order/{id}/pay" impl OrderGatewayDatabase, PaymentGateway);
/// Route handler for `POST /order/{id}/pay`
///
/// Settles the order with the payment method chosen at checkout. The response depends on the method:
/// * `electronic`: the signed parameters the client passes to the gateway SDK. The order stays unpaid until the
///   gateway calls back.
/// * `cash`: the paid order and its confirmed payment record.
/// * `cash_on_delivery`: the dispatched order and its pending payment record.
pub async fn pay_order<B: OrderGatewayDatabase, G: PaymentGateway>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST pay order {order_id} for user #{}", caller.user_id);
    let outcome = api.pay_order(caller.user_id, order_id).await?;
    Ok(ok_json(outcome))
}

route!(confirm_cash_payment => Post "/order/{id}/confirm-cash-payment" impl OrderGatewayDatabase, PaymentGateway where requires [Role::Courier, Role::Admin]);
/// Route handler for `POST /order/{id}/confirm-cash-payment`
///
/// Couriers (and admins) report the cash collected for a cash-on-delivery order. The collected amount is recorded even
/// if it differs from the amount expected. An order can only be confirmed once.
pub async fn confirm_cash_payment<B: OrderGatewayDatabase, G: PaymentGateway>(
    caller: Caller,
    path: web::Path<i64>,
    body: web::Json<CashConfirmationParams>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let params = body.into_inner();
    let collector_id = params.collector_id.unwrap_or(caller.user_id);
    debug!("💻️ POST confirm cash payment of {} for order {order_id} by #{collector_id}", params.actual_amount);
    let (order, record) = api.confirm_cash_on_delivery(order_id, params.actual_amount, collector_id).await?;
    Ok(ok_json(serde_json::json!({ "order": order, "record": record })))
}

route!(payment_notify => Post "" impl OrderGatewayDatabase, PaymentGateway);
/// Route handler for `POST /pay/notify`
///
/// The payment gateway's callback. Signature and IP checks are done by the middleware wrapping this route. The reply is
/// the gateway's own acknowledgement format. Anything that was understood, including repeats and declined payments,
/// is acknowledged as received so that the gateway stops retrying.
pub async fn payment_notify<B: OrderGatewayDatabase, G: PaymentGateway>(
    body: web::Bytes,
    api: web::Data<SettlementApi<B, G>>,
) -> HttpResponse {
    trace!("💻️ Received payment notification");
    match api.process_gateway_notification(body.as_ref()).await {
        Ok(outcome) => {
            match outcome {
                NotificationOutcome::Paid(order) => info!("💻️ Payment notification applied to order {}", order.order_no),
                NotificationOutcome::Duplicate(order) => debug!("💻️ Repeat notification for order {}", order.order_no),
                NotificationOutcome::Declined(order_no) => info!("💻️ Gateway declined payment for order {order_no}"),
            }
            xml_response(StatusCode::OK, api.acknowledgement(true))
        },
        Err(e) => {
            let err = ServerError::from(e);
            warn!("💻️ Payment notification was not accepted. {err}");
            xml_response(err.status_code(), api.acknowledgement(false))
        },
    }
}

fn xml_response(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status).content_type("application/xml").body(body)
}

route!(payment_status => Get "/pay/status/{order_no}" impl OrderGatewayDatabase, PaymentGateway);
/// Route handler for `GET /pay/status/{order_no}`
///
/// Users can only see their own orders. Admins can see any order.
pub async fn payment_status<B: OrderGatewayDatabase, G: PaymentGateway>(
    caller: Caller,
    path: web::Path<String>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_no = OrderNo::from(path.into_inner());
    debug!("💻️ GET payment status of {order_no} for user #{}", caller.user_id);
    let owner = (!caller.is_admin()).then_some(caller.user_id);
    let status = api.payment_status(owner, &order_no).await?;
    Ok(ok_json(status))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(orders_search => Get "/admin/order/search" impl OrderManagement where requires [Role::Admin]);
/// Route handler for `GET /admin/order/search`
///
/// All parameters are optional: `order_no` (fragment), `user_id`, `status` (comma-separated), `since` and `until`
/// (RFC 3339 timestamps), plus `page` and `size` as for `/order/list`.
pub async fn orders_search<B: OrderManagement>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let paging = query.paging().map_err(ServerError::InvalidQuery)?;
    let filter = OrderQueryFilter::try_from(query.into_inner()).map_err(ServerError::InvalidQuery)?;
    debug!("💻️ GET orders search for [{filter}], page {}", paging.page);
    let page = api.search_orders(filter, paging).await?;
    Ok(ok_json(page))
}

route!(order_by_id => Get "/admin/order/{id}" impl OrderManagement where requires [Role::Admin]);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET admin order {order_id}");
    let order = api.order_by_id(order_id).await?;
    Ok(ok_json(order))
}

route!(ship_order => Put "/admin/order/{id}/ship" impl OrderGatewayDatabase where requires [Role::Admin]);
pub async fn ship_order<B: OrderGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<ShipOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let ShipOrderParams { company, tracking_no } = body.into_inner();
    debug!("💻️ PUT ship order {order_id} with {company} ({tracking_no})");
    let order = api.ship_order(order_id, &company, &tracking_no).await?;
    Ok(ok_json(order))
}

route!(admin_confirm_receipt => Put "/admin/order/{id}/confirm" impl OrderGatewayDatabase where requires [Role::Admin]);
/// Route handler for `PUT /admin/order/{id}/confirm`
///
/// Confirms receipt on the customer's behalf. The usual transition rules apply, so unpaid cash-on-delivery orders are
/// still refused.
pub async fn admin_confirm_receipt<B: OrderGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT admin confirm receipt of order {order_id}");
    let order = api.confirm_receipt_on_behalf(order_id).await?;
    Ok(ok_json(order))
}

route!(cancel_order => Put "/admin/order/{id}/cancel" impl OrderGatewayDatabase where requires [Role::Admin]);
pub async fn cancel_order<B: OrderGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<ReasonParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let reason = required_reason(body.into_inner())?;
    debug!("💻️ PUT admin cancel order {order_id}. {reason}");
    let order = api.cancel_order(order_id, &reason).await?;
    Ok(ok_json(order))
}

route!(refund_order => Put "/admin/order/{id}/refund" impl OrderGatewayDatabase where requires [Role::Admin]);
pub async fn refund_order<B: OrderGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<ReasonParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let reason = required_reason(body.into_inner())?;
    debug!("💻️ PUT refund order {order_id}. {reason}");
    let order = api.refund_order(order_id, &reason).await?;
    Ok(ok_json(order))
}

fn required_reason(params: ReasonParams) -> Result<String, ServerError> {
    let reason = params.reason.trim().to_string();
    if reason.is_empty() {
        return Err(ServerError::InvalidRequestBody("A reason is required".into()));
    }
    Ok(reason)
}

route!(pricing_policy => Get "/admin/pricing" impl OrderGatewayDatabase where requires [Role::Admin]);
pub async fn pricing_policy<B: OrderGatewayDatabase>(api: web::Data<OrderFlowApi<B>>) -> HttpResponse {
    debug!("💻️ GET pricing policy");
    ok_json(api.pricing_policy())
}

route!(update_pricing_policy => Put "/admin/pricing" impl OrderGatewayDatabase where requires [Role::Admin]);
/// Route handler for `PUT /admin/pricing`
///
/// Replaces the delivery fee table for every worker, e.g. `{"standard_fee": "0.00", "expedited_fee": "12.00"}`.
/// Orders that already exist keep the fee they were created with.
pub async fn update_pricing_policy<B: OrderGatewayDatabase>(
    body: web::Json<PricingPolicy>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let policy = body.into_inner();
    if policy.standard_fee.is_negative() || policy.expedited_fee.is_negative() {
        return Err(ServerError::InvalidRequestBody("Delivery fees cannot be negative".into()));
    }
    debug!("💻️ PUT pricing policy");
    api.update_pricing_policy(policy);
    Ok(ok_json(api.pricing_policy()))
}

route!(reset_pricing_policy => Delete "/admin/pricing" impl OrderGatewayDatabase where requires [Role::Admin]);
/// Route handler for `DELETE /admin/pricing`. Restores the default delivery fees.
pub async fn reset_pricing_policy<B: OrderGatewayDatabase>(api: web::Data<OrderFlowApi<B>>) -> HttpResponse {
    debug!("💻️ DELETE pricing policy");
    api.reset_pricing_policy();
    ok_json(api.pricing_policy())
}
