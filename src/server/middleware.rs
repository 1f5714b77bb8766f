//! Cross-cutting HTTP layers
//!
//! Applied around the whole router by [`ServerBuilder`](super::ServerBuilder),
//! from outermost to innermost:
//!
//! 1. request tracing (development only)
//! 2. security response headers
//! 3. CORS
//! 4. error trace exposure (non-production only)
//! 5. panic recovery

use crate::config::Environment;
use crate::core::error::{ApiError, ErrorTrace};
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::any::Any;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Error bodies are small JSON documents; anything bigger is left untouched
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Wrap a router with every cross-cutting layer
pub fn apply(router: Router, environment: Environment, allowed_origins: &[String]) -> Router {
    let router = router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(environment, expose_error_trace))
        .layer(cors_layer(allowed_origins));
    let router = with_security_headers(router);

    if environment.is_development() {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// CORS restricted to the configured origins, with credentials
///
/// Requests without an `Origin` header pass through untouched; disallowed
/// origins get no CORS headers, so browsers block the response.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(600))
}

fn with_security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_DNS_PREFETCH_CONTROL,
            HeaderValue::from_static("off"),
        ))
}

/// Render a handler panic as a generic 500
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

/// Add a `stack` field to error bodies outside production
///
/// Error responses carry their debug rendering in an [`ErrorTrace`]
/// extension; this is the only place that decides whether clients see it.
pub async fn expose_error_trace(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if environment.is_production() {
        return response;
    }

    let Some(ErrorTrace(trace)) = response.extensions().get::<ErrorTrace>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("could not buffer error body: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut object)) => {
            object.insert("stack".to_string(), Value::String(trace));
            match serde_json::to_vec(&Value::Object(object)) {
                Ok(encoded) => {
                    parts.headers.remove(header::CONTENT_LENGTH);
                    Body::from(encoded)
                }
                Err(_) => Body::from(bytes),
            }
        }
        _ => Body::from(bytes),
    };

    Response::from_parts(parts, body)
}
