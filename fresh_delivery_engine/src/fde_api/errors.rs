use thiserror::Error;

use crate::traits::{OrderGatewayError, PaymentGatewayError};

/// The coarse failure classes that callers (e.g. an HTTP layer) need to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    OrderNotFound,
    ProductNotFound,
    AddressNotOwned,
    Forbidden,
    InsufficientStock,
    OrderStatus,
    /// The payment gateway failed or could not be reached
    SettlementFailed,
    /// The settlement itself was rejected, e.g. an amount mismatch
    SettlementRejected,
    Persistence,
}

impl OrderGatewayError {
    pub fn category(&self) -> ErrorCategory {
        use OrderGatewayError::*;
        match self {
            DatabaseError(_) | DuplicateOrderNumber(_) => ErrorCategory::Persistence,
            OrderNotFound(_) | OrderNumberNotFound(_) | PaymentRecordNotFound(_) => ErrorCategory::OrderNotFound,
            ProductNotFound(_) => ErrorCategory::ProductNotFound,
            AddressNotOwned(_) => ErrorCategory::AddressNotOwned,
            InsufficientStock { .. } => ErrorCategory::InsufficientStock,
            InvalidQuantity(_) => ErrorCategory::Validation,
            IllegalTransition(_) | ConcurrentModification(_) => ErrorCategory::OrderStatus,
            AmountMismatch { .. } | TransactionMismatch { .. } => ErrorCategory::SettlementRejected,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid order line: {0}")]
    InvalidOrderLine(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Could not allocate a unique order number after {0} attempts")]
    OrderNumberExhausted(usize),
    #[error("{0}")]
    Backend(#[from] OrderGatewayError),
}

impl OrderFlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderFlowError::InvalidOrderLine(_) | OrderFlowError::InvalidRequest(_) => ErrorCategory::Validation,
            OrderFlowError::Forbidden(_) => ErrorCategory::Forbidden,
            OrderFlowError::OrderNumberExhausted(_) => ErrorCategory::Persistence,
            OrderFlowError::Backend(e) => e.category(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] PaymentGatewayError),
    #[error("{0}")]
    Backend(#[from] OrderGatewayError),
}

impl SettlementError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SettlementError::Forbidden(_) => ErrorCategory::Forbidden,
            SettlementError::InvalidAmount(_) => ErrorCategory::Validation,
            SettlementError::Gateway(PaymentGatewayError::InvalidNotification(_)) => ErrorCategory::Validation,
            SettlementError::Gateway(_) => ErrorCategory::SettlementFailed,
            SettlementError::Backend(e) => e.category(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum QueryApiError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    Backend(#[from] OrderGatewayError),
}

impl QueryApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            QueryApiError::InvalidQuery(_) => ErrorCategory::Validation,
            QueryApiError::Forbidden(_) => ErrorCategory::Forbidden,
            QueryApiError::Backend(e) => e.category(),
        }
    }
}
