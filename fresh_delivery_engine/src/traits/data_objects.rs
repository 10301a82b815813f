use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// One line of a stock deduction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl StockLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayPaymentOutcome {
    /// The notification moved the order to paid.
    Applied(Order),
    /// The same transaction had already been applied. Nothing changed.
    AlreadyApplied(Order),
}

impl GatewayPaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            GatewayPaymentOutcome::Applied(o) | GatewayPaymentOutcome::AlreadyApplied(o) => o,
        }
    }
}
