//! # Pizza Orders
//!
//! REST backend for a pizzeria's orders: customers place orders, staff list
//! them, follow them through preparation and delivery, and remove them.
//!
//! ## Features
//!
//! - **Public ordering**: `POST /api/orders` needs no account
//! - **Protected administration**: listing, lookup, status changes and
//!   deletion require an RS256 bearer token from the identity provider
//! - **Declarative validation**: every violated field is reported in one 400
//! - **MongoDB persistence**: one cached, ping-verified client per process
//! - **Uniform errors**: `{success: false, error, code, details?}` everywhere
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pizza_orders::prelude::*;
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_env()?;
//! let manager = Arc::new(MongoConnectionManager::new(config.mongodb.clone()));
//! let gate = AuthGate::new(
//!     JwtVerifier::for_domain(&config.auth.domain, &config.auth.audience, reqwest::Client::new()),
//!     AuthPolicy::from_permissions(config.auth.required_permissions.clone()),
//! );
//!
//! ServerBuilder::new()
//!     .with_repository(MongoOrderRepository::new(manager.clone()))
//!     .with_auth_gate(gate)
//!     .with_allowed_origins(config.allowed_origins.clone())
//!     .with_environment(config.environment)
//!     .serve("0.0.0.0:3000")
//!     .await?;
//!
//! manager.close().await;
//! ```

pub mod config;
pub mod core;
pub mod orders;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Configuration ===
    pub use crate::config::{AppConfig, AuthConfig, ConfigError, Environment, MongoConfig};

    // === Core ===
    pub use crate::core::{
        auth::{
            AuthContext, AuthError, AuthGate, AuthPolicy, JwksKeyProvider, JwtVerifier,
            KeyProvider, StaticKeyProvider, require_auth,
        },
        error::{ApiError, ApiResult, StorageError, ValidationError},
        order::{
            Order, OrderDocument, OrderDraft, OrderId, OrderStatus, OrderUpdate, PizzaSize,
            create_order_document, create_order_update, validate_order, validate_order_status,
        },
        service::{LIST_LIMIT, OrderFilter, OrderRepository, UpdateOutcome},
        validation::{ValidatedId, ValidatedJson, ValidatedQuery, ValidatedStatusUpdate},
    };

    // === Handlers ===
    pub use crate::orders::{OrderAppState, build_order_routes};

    // === Server ===
    pub use crate::server::{ServerBuilder, ServerError};

    // === Storage ===
    pub use crate::storage::{
        InMemoryOrderRepository, MongoConnectionManager, MongoOrderRepository,
    };

    // === Common external re-exports ===
    pub use async_trait::async_trait;
    pub use axum::Router;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
