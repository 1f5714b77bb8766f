//! Repository trait for order persistence

use crate::core::error::ApiResult;
use crate::core::order::{Order, OrderDocument, OrderStatus, OrderUpdate};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Maximum number of orders returned by a listing
pub const LIST_LIMIT: usize = 100;

/// Exact-match filter over top-level order fields
///
/// Field names use their wire spelling (`status`, `size`, `contactInfo`...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    fields: BTreeMap<String, String>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the wire value of the status field
    ///
    /// Unknown values are kept as-is and simply match nothing.
    pub fn status(value: impl Into<String>) -> Self {
        Self::new().with("status", value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether an order satisfies every condition
    ///
    /// Conditions on fields an order does not have never match.
    pub fn matches(&self, order: &Order) -> bool {
        self.fields.iter().all(|(field, expected)| {
            let actual = match field.as_str() {
                "id" | "_id" => order.id.to_hex(),
                "pizza" => order.pizza.clone(),
                "size" => order.size.as_str().to_string(),
                "contactInfo" => order.contact_info.clone(),
                "status" => order.status.as_str().to_string(),
                _ => return false,
            };
            &actual == expected
        })
    }
}

impl From<OrderStatus> for OrderFilter {
    fn from(status: OrderStatus) -> Self {
        Self::status(status.as_str())
    }
}

/// Result of a status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// An order with the identifier exists
    pub matched: bool,
    /// Number of orders actually changed
    pub modified: u64,
}

/// Persistence operations on orders
///
/// Identifiers are passed in their hexadecimal text form; implementations
/// reject text that is not a valid datastore identifier with
/// [`ApiError::InvalidId`](crate::core::error::ApiError::InvalidId).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a prepared document and return it with its new id
    async fn create(&self, document: OrderDocument) -> ApiResult<Order>;

    /// Orders matching the filter, newest first, at most [`LIST_LIMIT`]
    async fn list_all(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>>;

    /// Fetch one order
    async fn get_by_id(&self, id: &str) -> ApiResult<Option<Order>>;

    /// Apply a status update
    async fn update_status(&self, id: &str, update: OrderUpdate) -> ApiResult<UpdateOutcome>;

    /// Delete one order, returning the number of deleted orders (0 or 1)
    async fn delete(&self, id: &str) -> ApiResult<u64>;
}
