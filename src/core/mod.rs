//! Core module containing the order model, errors, validation and auth

pub mod auth;
pub mod error;
pub mod order;
pub mod service;
pub mod validation;

pub use auth::{AuthContext, AuthGate, AuthPolicy, JwtVerifier, KeyProvider};
pub use error::{ApiError, ApiResult, StorageError, ValidationError};
pub use order::{
    Order, OrderDocument, OrderDraft, OrderId, OrderStatus, OrderUpdate, PizzaSize,
    create_order_document, create_order_update, validate_order, validate_order_status,
};
pub use service::{LIST_LIMIT, OrderFilter, OrderRepository, UpdateOutcome};
