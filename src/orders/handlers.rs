//! HTTP handlers for order operations
//!
//! Handlers only orchestrate: extractors have already validated the input,
//! the repository does the persistence, and every failure is returned as an
//! [`ApiError`] for the error layer to render.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::{ApiError, ApiResult};
use crate::core::order::{Order, OrderDraft, OrderStatus, create_order_document, create_order_update};
use crate::core::service::{OrderFilter, OrderRepository};
use crate::core::validation::{ValidatedId, ValidatedJson, ValidatedQuery, ValidatedStatusUpdate};

/// Application state shared across order handlers
#[derive(Clone)]
pub struct OrderAppState {
    pub repository: Arc<dyn OrderRepository>,
}

impl OrderAppState {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }
}

/// Query parameters of the listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

/// `{success, message?, data}` envelope of single-order responses
#[derive(Debug, Serialize)]
pub struct OrderResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

/// Response for the list endpoint
#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Order>,
}

/// Response confirming a status change
#[derive(Debug, Serialize)]
pub struct StatusData {
    pub status: OrderStatus,
}

/// Response for the delete endpoint
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Create a new order
///
/// POST /api/orders
pub async fn create_order(
    State(state): State<OrderAppState>,
    ValidatedJson(draft): ValidatedJson<OrderDraft>,
) -> ApiResult<(StatusCode, Json<OrderResponse<Order>>)> {
    let document = create_order_document(&draft)?;
    let order = state.repository.create(document).await?;

    tracing::info!(id = %order.id, size = %order.size, "order created");

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            success: true,
            message: Some("Order created successfully"),
            data: order,
        }),
    ))
}

/// List orders, newest first
///
/// GET /api/orders?status=...
pub async fn list_orders(
    State(state): State<OrderAppState>,
    ValidatedQuery(query): ValidatedQuery<ListOrdersQuery>,
) -> ApiResult<Json<ListOrdersResponse>> {
    let filter = match query.status.as_deref().map(str::trim) {
        Some(status) if !status.is_empty() => OrderFilter::status(status),
        _ => OrderFilter::new(),
    };

    let orders = state.repository.list_all(&filter).await?;

    Ok(Json(ListOrdersResponse {
        success: true,
        count: orders.len(),
        data: orders,
    }))
}

/// Get a specific order
///
/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<OrderAppState>,
    ValidatedId(id): ValidatedId,
) -> ApiResult<Json<OrderResponse<Order>>> {
    let order = state
        .repository
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::order_not_found(&id))?;

    Ok(Json(OrderResponse {
        success: true,
        message: None,
        data: order,
    }))
}

/// Replace the status of an order
///
/// PATCH /api/orders/{id}/status
pub async fn update_order_status(
    State(state): State<OrderAppState>,
    ValidatedStatusUpdate { id, status }: ValidatedStatusUpdate,
) -> ApiResult<Json<OrderResponse<StatusData>>> {
    let outcome = state
        .repository
        .update_status(&id, create_order_update(status))
        .await?;

    if !outcome.matched {
        return Err(ApiError::order_not_found(&id));
    }

    tracing::info!(id = %id, status = %status, "order status updated");

    Ok(Json(OrderResponse {
        success: true,
        message: Some("Order status updated"),
        data: StatusData { status },
    }))
}

/// Delete an order
///
/// DELETE /api/orders/{id}
pub async fn delete_order(
    State(state): State<OrderAppState>,
    ValidatedId(id): ValidatedId,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state.repository.delete(&id).await?;

    if deleted == 0 {
        return Err(ApiError::order_not_found(&id));
    }

    tracing::info!(id = %id, "order deleted");

    Ok(Json(MessageResponse {
        success: true,
        message: "Order deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryOrderRepository;

    fn state() -> OrderAppState {
        OrderAppState::new(Arc::new(InMemoryOrderRepository::new()))
    }

    fn draft() -> ValidatedJson<OrderDraft> {
        ValidatedJson(OrderDraft::new("Margherita", "mediana", "5551234"))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let state = state();
        let (status, Json(created)) = create_order(State(state.clone()), draft()).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.data.status, OrderStatus::Pending);

        let Json(fetched) = get_order(State(state), ValidatedId(created.data.id.to_hex()))
            .await
            .unwrap();
        assert_eq!(fetched.data, created.data);
    }

    #[tokio::test]
    async fn test_create_revalidates_draft() {
        let err = create_order(
            State(state()),
            ValidatedJson(OrderDraft::new("Hi", "mediana", "5551234")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = get_order(State(state()), ValidatedId("65f1c0ffee0000000000abcd".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_with_blank_status_lists_everything() {
        let state = state();
        create_order(State(state.clone()), draft()).await.unwrap();

        let Json(list) = list_orders(
            State(state),
            ValidatedQuery(ListOrdersQuery {
                status: Some("  ".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(list.count, 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let err = update_order_status(
            State(state()),
            ValidatedStatusUpdate {
                id: "65f1c0ffee0000000000abcd".to_string(),
                status: OrderStatus::Ready,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let state = state();
        let (_, Json(created)) = create_order(State(state.clone()), draft()).await.unwrap();
        let id = created.data.id.to_hex();

        assert!(delete_order(State(state.clone()), ValidatedId(id.clone())).await.is_ok());
        let err = delete_order(State(state), ValidatedId(id)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
