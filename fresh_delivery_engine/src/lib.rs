//! Fresh Delivery Engine
//!
//! The order engine behind the fresh-produce delivery service. It turns a cart selection into a persisted order,
//! settles it with the customer's chosen payment method and drives it through fulfilment. The library is
//! transport-agnostic; the HTTP surface lives in `fresh_delivery_server`.
//!
//! The library is divided into these main sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite implementation ([`SqliteDatabase`]). You should never need to
//!    touch the database directly. The data types stored in the database are defined in [`mod@db_types`] and are
//!    public.
//! 2. The public API (`fde_api`): [`OrderFlowApi`], [`SettlementApi`] and [`QueryApi`]. These hold the business rules
//!    and are generic over the backend traits, so alternative backends (or mocks) can be dropped in.
//! 3. The order lifecycle rules in [`mod@state_machine`].
//!
//! The engine also emits events when orders are created, paid, cancelled or completed. A simple actor framework
//! ([`mod@events`]) lets you hook into these events and perform custom actions, such as updating sales counters.
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod helpers;
pub mod state_machine;
pub mod traits;

mod fde_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use fde_api::{
    errors::{ErrorCategory, OrderFlowError, QueryApiError, SettlementError},
    order_flow_api::{OrderFlowApi, MAX_ORDER_NUMBER_ATTEMPTS},
    order_objects,
    pricing::{PricingPolicy, PricingPolicyHandle, DEFAULT_EXPEDITED_DELIVERY_FEE, DEFAULT_STANDARD_DELIVERY_FEE},
    query_api::QueryApi,
    settlement_api::SettlementApi,
    settlement_objects,
};
pub use gateway::{GatewayConfig, SignedPaymentGateway};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AddressBook,
    CartReconciler,
    InventoryLedger,
    OrderGatewayDatabase,
    OrderGatewayError,
    OrderManagement,
    PaymentGateway,
};
