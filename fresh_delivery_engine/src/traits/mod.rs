//! # Backend contracts
//!
//! This module defines the interfaces that order engine *backends* and external collaborators must provide.
//!
//! * [`OrderGatewayDatabase`] defines the highest level of behaviour: order creation and every state-changing
//!   operation, each as a single atomic transaction.
//! * [`OrderManagement`] provides read-only queries over orders and payment records.
//! * [`InventoryLedger`] is the stock ledger for products.
//! * [`CartReconciler`] removes ordered lines from a user's cart.
//! * [`AddressBook`] gives read access to delivery addresses.
//! * [`PaymentGateway`] is the external electronic payment provider.
mod address_book;
mod cart_reconciler;
mod data_objects;
mod inventory_ledger;
mod order_gateway_database;
mod order_management;
mod payment_gateway;

pub use address_book::AddressBook;
pub use cart_reconciler::CartReconciler;
pub use data_objects::{GatewayPaymentOutcome, StockLine};
pub use inventory_ledger::InventoryLedger;
pub use order_gateway_database::{OrderGatewayDatabase, OrderGatewayError};
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayNotification, GatewayParams, PaymentGateway, PaymentGatewayError, PrepayRequest};
