//! Typed error handling for the order API
//!
//! Every failure in request handling ends up as an [`ApiError`]. Handlers and
//! repositories return it with `?` and never format error JSON themselves;
//! the single [`IntoResponse`] impl at the bottom of this module is the
//! translation layer between error kinds and HTTP responses.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: field constraints violated (400)
//! - [`ApiError::InvalidId`]: malformed order identifier (400)
//! - [`ApiError::Unauthorized`]: missing/invalid/expired bearer token (401)
//! - [`ApiError::Forbidden`]: valid token, missing permission (403)
//! - [`ApiError::NotFound`]: no order for the identifier (404)
//! - [`StorageError`]: any datastore failure, including connecting (500)
//!
//! # Example
//!
//! ```rust,ignore
//! async fn fetch(repo: &dyn OrderRepository, id: &str) -> ApiResult<Order> {
//!     repo.get_by_id(id).await?.ok_or_else(|| ApiError::order_not_found(id))
//! }
//! ```

use crate::core::auth::AuthError;
use crate::core::order::{InvalidOrderId, OrderValidation};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Generic message for every 401, whatever claim failed
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or expired token. Please log in again.";

/// Generic message for every 5xx
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// The main error type for the order API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed field validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Identifier is not in the datastore's format
    #[error(transparent)]
    InvalidId(#[from] InvalidOrderId),

    /// Bearer token missing, malformed, expired or otherwise rejected
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Token is valid but lacks permissions
    #[error("forbidden: missing permissions {missing:?}")]
    Forbidden { missing: Vec<String> },

    /// No order with this identifier
    #[error("order '{id}' not found")]
    NotFound { id: String },

    /// No route matched the request
    #[error("route {path} not found")]
    RouteNotFound { path: String },

    /// Datastore failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Anything else that went wrong while handling a request
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn order_not_found(id: impl Into<String>) -> Self {
        ApiError::NotFound { id: id.into() }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidId(_) => "INVALID_ID",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::NotFound { .. } => "ORDER_NOT_FOUND",
            ApiError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            ApiError::Storage(e) => e.error_code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message
    ///
    /// Never carries datastore or token detail.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.public_message().to_string(),
            ApiError::InvalidId(_) => "Invalid order id".to_string(),
            ApiError::Unauthorized(_) => UNAUTHORIZED_MESSAGE.to_string(),
            ApiError::Forbidden { .. } => {
                "You do not have sufficient permissions to perform this action".to_string()
            }
            ApiError::NotFound { .. } => "Order not found".to_string(),
            ApiError::RouteNotFound { .. } => "Route not found".to_string(),
            ApiError::Storage(_) | ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: self.public_message(),
            code: self.error_code().to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(e) => Some(serde_json::json!(e.field_errors())),
            _ => None,
        }
    }

    /// Debug rendering of the error and its source chain
    pub fn trace(&self) -> String {
        let mut trace = format!("{:?}", self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            trace.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        trace
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Debug rendering of the failure, attached to error responses as an
/// extension so the top-level middleware can expose it outside production
#[derive(Debug, Clone)]
pub struct ErrorTrace(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        let trace = ErrorTrace(self.trace());
        let mut response = (status, Json(self.to_response())).into_response();
        response.extensions_mut().insert(trace);
        response
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A single field validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl FieldValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors related to input validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more fields violated their rules
    #[error("validation errors: {}", join_fields(.0))]
    FieldErrors(Vec<FieldValidationError>),

    /// The draft failed order-level validation
    #[error("invalid order: {}", join_fields(.0))]
    InvalidOrder(Vec<FieldValidationError>),

    /// The status is not in the status enumeration
    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    /// Request body is not valid JSON
    #[error("invalid JSON: {message}")]
    InvalidJson { message: String },

    /// Query string could not be deserialized
    #[error("invalid query string: {message}")]
    InvalidQuery { message: String },
}

fn join_fields(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    fn public_message(&self) -> &'static str {
        match self {
            ValidationError::FieldErrors(_) => "Validation error",
            ValidationError::InvalidOrder(_) => "Invalid order data",
            ValidationError::InvalidStatus(_) => "Invalid status",
            ValidationError::InvalidJson { .. } => "Invalid JSON body",
            ValidationError::InvalidQuery { .. } => "Invalid query string",
        }
    }

    /// Violations as `{field, message}` pairs
    pub fn field_errors(&self) -> Vec<FieldValidationError> {
        match self {
            ValidationError::FieldErrors(errors) | ValidationError::InvalidOrder(errors) => {
                errors.clone()
            }
            ValidationError::InvalidStatus(_) => vec![FieldValidationError::new(
                "status",
                "status is not a valid order status",
            )],
            ValidationError::InvalidJson { message } => {
                vec![FieldValidationError::new("body", message.as_str())]
            }
            ValidationError::InvalidQuery { message } => {
                vec![FieldValidationError::new("query", message.as_str())]
            }
        }
    }
}

impl From<OrderValidation> for ApiError {
    fn from(validation: OrderValidation) -> Self {
        ApiError::Validation(ValidationError::InvalidOrder(validation.errors))
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors related to the datastore
#[derive(Debug, Error)]
pub enum StorageError {
    /// The connection could not be established or failed its liveness check
    #[error("failed to connect to {backend}: {message}")]
    Connection {
        backend: &'static str,
        message: String,
    },

    /// A datastore operation failed
    #[error("failed to {operation} order(s)")]
    Operation {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The datastore returned something the repository cannot interpret
    #[error("data integrity error: {message}")]
    Integrity { message: String },
}

impl StorageError {
    pub fn operation(operation: &'static str, source: impl Into<BoxError>) -> Self {
        StorageError::Operation {
            operation,
            source: source.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Connection { .. } => "CONNECTION_ERROR",
            StorageError::Operation { .. } => "DATASTORE_ERROR",
            StorageError::Integrity { .. } => "DATASTORE_ERROR",
        }
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;
