use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpRequest, HttpServer};
use fresh_delivery_engine::{
    events::{EventHandlers, EventHooks},
    traits::StockLine,
    InventoryLedger,
    OrderFlowApi,
    PricingPolicyHandle,
    QueryApi,
    SettlementApi,
    SignedPaymentGateway,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::{HmacMiddlewareFactory, IpWhitelistFactory, SIGNATURE_HEADER},
    routes::{
        health,
        AdminConfirmReceiptRoute,
        CancelMyOrderRoute,
        CancelOrderRoute,
        ConfirmCashPaymentRoute,
        ConfirmReceiptRoute,
        CreateOrderRoute,
        MyOrderRoute,
        MyOrderStatsRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        PayOrderRoute,
        PaymentNotifyRoute,
        PaymentStatusRoute,
        PricingPolicyRoute,
        RefundOrderRoute,
        ResetPricingPolicyRoute,
        ShipOrderRoute,
        UpdatePricingPolicyRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations()
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let srv = create_server_instance(config, db).await?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that run for the lifetime of the server. Completed orders are added to the products' sales counters.
pub fn create_event_hooks(db: SqliteDatabase) -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            info!("📬️ Order {} created ({} lines, {})", ev.order.order_no, ev.items.len(), ev.order.total_amount);
            Box::pin(async {})
        })
        .on_order_paid(|ev| {
            info!("📬️ Order {} paid ({})", ev.order.order_no, ev.order.payment_method);
            Box::pin(async {})
        })
        .on_order_cancelled(|ev| {
            info!("📬️ Order {} cancelled. {}", ev.order.order_no, ev.reason);
            Box::pin(async {})
        })
        .on_order_refunded(|ev| {
            info!("📬️ Order {} refunded. {}", ev.order.order_no, ev.reason);
            Box::pin(async {})
        })
        .on_order_completed(move |ev| {
            let db = db.clone();
            Box::pin(async move {
                let lines = ev.items.iter().map(|i| StockLine::new(i.product_id, i.quantity)).collect::<Vec<_>>();
                match db.record_sales(&lines).await {
                    Ok(()) => debug!("📬️ Sales recorded for order {}", ev.order.order_no),
                    Err(e) => error!("📬️ Could not record sales for order {}. {e}", ev.order.order_no),
                }
            })
        });
    hooks
}

pub async fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks(db.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    // One policy for every worker, so that a reload is seen everywhere
    let pricing = PricingPolicyHandle::new(config.pricing);
    let gateway = SignedPaymentGateway::new(config.gateway.gateway_config());
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone(), pricing.clone());
        let settlement_api =
            SettlementApi::new(db.clone(), gateway.clone(), producers.clone(), config.gateway.notify_url.as_str());
        let query_api = QueryApi::new(db.clone());
        let notify_scope = web::scope("/pay/notify")
            .wrap(HmacMiddlewareFactory::new(
                SIGNATURE_HEADER,
                config.gateway.api_key.clone(),
                config.gateway.hmac_checks,
            ))
            .wrap(IpWhitelistFactory::new(
                config.gateway.whitelist.clone(),
                config.use_x_forwarded_for,
                config.use_forwarded,
            ))
            .service(PaymentNotifyRoute::<SqliteDatabase, SignedPaymentGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fd::access_log"))
            .configure(configure_extractors)
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(query_api))
            .service(health)
            .service(notify_scope)
            // Fixed paths must be registered before /order/{id}
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(MyOrderStatsRoute::<SqliteDatabase>::new())
            .service(MyOrderRoute::<SqliteDatabase>::new())
            .service(CancelMyOrderRoute::<SqliteDatabase>::new())
            .service(ConfirmReceiptRoute::<SqliteDatabase>::new())
            .service(PayOrderRoute::<SqliteDatabase, SignedPaymentGateway>::new())
            .service(ConfirmCashPaymentRoute::<SqliteDatabase, SignedPaymentGateway>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, SignedPaymentGateway>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(ShipOrderRoute::<SqliteDatabase>::new())
            .service(AdminConfirmReceiptRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(RefundOrderRoute::<SqliteDatabase>::new())
            .service(PricingPolicyRoute::<SqliteDatabase>::new())
            .service(UpdatePricingPolicyRoute::<SqliteDatabase>::new())
            .service(ResetPricingPolicyRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Makes extractor failures (bad JSON, query strings or path segments) answer with the standard envelope.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|e, req| {
        log_rejection(req, &e);
        ServerError::InvalidRequestBody(e.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|e, req| {
        log_rejection(req, &e);
        ServerError::InvalidQuery(e.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|e, req| {
        log_rejection(req, &e);
        ServerError::InvalidRequestPath(e.to_string()).into()
    }));
}

fn log_rejection<E: std::fmt::Display>(req: &HttpRequest, e: &E) {
    debug!("💻️ Rejecting malformed request to {}. {e}", req.path());
}
