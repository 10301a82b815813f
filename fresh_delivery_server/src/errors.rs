use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fresh_delivery_engine::{ErrorCategory, OrderFlowError, QueryApiError, SettlementError};
use log::error;
use thiserror::Error;

use crate::data_objects::ApiResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
    #[error("Not authenticated. {0}")]
    Unauthorized(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    /// A failure reported by the order engine, already classified.
    #[error("{message}")]
    Engine { category: ErrorCategory, message: String },
}

impl ServerError {
    /// The business code carried in the response envelope.
    pub fn code(&self) -> i32 {
        match self {
            Self::Engine { category, .. } => category_code(*category),
            _ => i32::from(self.status_code().as_u16()),
        }
    }
}

pub fn category_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Validation => 400,
        ErrorCategory::OrderNotFound => 7001,
        ErrorCategory::ProductNotFound => 6001,
        ErrorCategory::AddressNotOwned => 8001,
        ErrorCategory::Forbidden => 403,
        ErrorCategory::InsufficientStock => 6003,
        ErrorCategory::OrderStatus => 7002,
        ErrorCategory::SettlementFailed | ErrorCategory::SettlementRejected => 7005,
        ErrorCategory::Persistence => 500,
    }
}

pub fn category_status(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::OrderNotFound | ErrorCategory::ProductNotFound => StatusCode::NOT_FOUND,
        ErrorCategory::AddressNotOwned | ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::InsufficientStock | ErrorCategory::OrderStatus => StatusCode::CONFLICT,
        ErrorCategory::SettlementFailed => StatusCode::BAD_GATEWAY,
        ErrorCategory::SettlementRejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine { category, .. } => category_status(*category),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        let body = ApiResponse::<()>::failure(self.code(), self.to_string());
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::to_string(&body).unwrap_or_else(|_| format!("{{\"code\":{}}}", self.code())))
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        Self::Engine { category: e.category(), message: e.to_string() }
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        Self::Engine { category: e.category(), message: e.to_string() }
    }
}

impl From<QueryApiError> for ServerError {
    fn from(e: QueryApiError) -> Self {
        Self::Engine { category: e.category(), message: e.to_string() }
    }
}
