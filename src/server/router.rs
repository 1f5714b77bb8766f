//! Router assembly: service routes, order routes and the 404 fallback

use crate::core::auth::AuthGate;
use crate::core::error::ApiError;
use crate::orders::{OrderAppState, build_order_routes};
use axum::{Json, Router, http::Uri, routing::get};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

/// Name reported by the root endpoint
pub const SERVICE_NAME: &str = "Pizza Orders API";

/// Build the complete application router (without cross-cutting layers)
pub fn build_router(state: OrderAppState, gate: AuthGate) -> Router {
    service_routes()
        .merge(build_order_routes(state, gate))
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
}

/// Root and health check routes
pub fn service_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }))
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound {
        path: uri.path().to_string(),
    }
}
