//! # Fresh delivery server
//! The HTTP surface of the fresh delivery order engine. It is responsible for:
//! * Turning requests into calls on the engine APIs ([`fresh_delivery_engine::OrderFlowApi`],
//!   [`fresh_delivery_engine::SettlementApi`] and [`fresh_delivery_engine::QueryApi`]).
//! * Wrapping every result in the `{code, message, data}` envelope.
//! * Receiving the payment gateway's callbacks, after checking their signature and origin.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/order/...`: Order creation, listing, cancellation and receipt confirmation for the calling user.
//! * `/order/{id}/pay` and `/pay/...`: Settlement, payment status and the gateway callback.
//! * `/admin/...`: Order search, shipping, receipt confirmation, cancellation, refunds and the delivery fee table.
//!   Admins only.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
