//! Order endpoints

pub mod handlers;

pub use handlers::{
    OrderAppState, create_order, delete_order, get_order, list_orders, update_order_status,
};

use crate::core::auth::{AuthGate, require_auth};
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

/// Build the `/api/orders` routes
///
/// - POST /api/orders - public
/// - GET /api/orders - bearer token
/// - GET /api/orders/{id} - bearer token
/// - PATCH /api/orders/{id}/status - bearer token
/// - DELETE /api/orders/{id} - bearer token
///
/// The token check wraps the protected handlers, so it runs before their
/// extractors validate the id or body.
pub fn build_order_routes(state: OrderAppState, gate: AuthGate) -> Router {
    let auth = middleware::from_fn_with_state(gate, require_auth);

    Router::new()
        .route(
            "/api/orders",
            post(create_order).merge(get(list_orders).route_layer(auth.clone())),
        )
        .route(
            "/api/orders/{id}",
            get(get_order).delete(delete_order).route_layer(auth.clone()),
        )
        .route(
            "/api/orders/{id}/status",
            patch(update_order_status).route_layer(auth),
        )
        .with_state(state)
}
