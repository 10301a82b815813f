//! # Fresh delivery engine public API
//!
//! The `fde_api` module exposes the programmatic API of the order engine. It is split by concern so that clients can
//! pick the parts they need:
//!
//! * [`order_flow_api`] creates orders and drives them through shipping, receipt, cancellation and refund.
//! * [`settlement_api`] routes an order to its payment method and handles gateway callbacks and cash confirmations.
//! * [`query_api`] answers read-only questions about orders for customers and administrators.
//!
//! The other submodules are support types.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits the API needs:
//!
//! ```rust,ignore
//! use fresh_delivery_engine::{events::EventProducers, OrderFlowApi, PricingPolicyHandle, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/fresh_delivery.db", 5).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default(), PricingPolicyHandle::default());
//! let created = api.create_order(request).await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod pricing;
pub mod query_api;
pub mod settlement_api;
pub mod settlement_objects;
