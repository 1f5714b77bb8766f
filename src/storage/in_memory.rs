//! In-memory implementation of OrderRepository for testing and development

use crate::core::error::{ApiResult, StorageError};
use crate::core::order::{Order, OrderDocument, OrderId, OrderUpdate};
use crate::core::service::{LIST_LIMIT, OrderFilter, OrderRepository, UpdateOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory order repository
///
/// Same identifier format, ordering and limit as the MongoDB repository.
/// Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.read().map(|orders| orders.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Integrity {
        message: format!("order store lock poisoned: {}", e),
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, document: OrderDocument) -> ApiResult<Order> {
        let mut orders = self.orders.write().map_err(lock_error)?;

        let order = document.with_id(OrderId::generate());
        orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn list_all(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>> {
        let orders = self.orders.read().map_err(lock_error)?;

        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();

        // ObjectIds grow monotonically within a process, so they break ties
        // between orders created in the same millisecond
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(LIST_LIMIT);

        Ok(matching)
    }

    async fn get_by_id(&self, id: &str) -> ApiResult<Option<Order>> {
        let id: OrderId = id.parse()?;
        let orders = self.orders.read().map_err(lock_error)?;

        Ok(orders.get(&id).cloned())
    }

    async fn update_status(&self, id: &str, update: OrderUpdate) -> ApiResult<UpdateOutcome> {
        let id: OrderId = id.parse()?;
        let mut orders = self.orders.write().map_err(lock_error)?;

        match orders.get_mut(&id) {
            Some(order) => {
                let changed = order.status != update.status || order.updated_at != update.updated_at;
                order.apply(&update);
                Ok(UpdateOutcome {
                    matched: true,
                    modified: u64::from(changed),
                })
            }
            None => Ok(UpdateOutcome {
                matched: false,
                modified: 0,
            }),
        }
    }

    async fn delete(&self, id: &str) -> ApiResult<u64> {
        let id: OrderId = id.parse()?;
        let mut orders = self.orders.write().map_err(lock_error)?;

        Ok(u64::from(orders.remove(&id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ApiError;
    use crate::core::order::{
        OrderDraft, OrderStatus, create_order_document, create_order_update,
    };

    fn draft(pizza: &str) -> OrderDocument {
        create_order_document(&OrderDraft::new(pizza, "mediana", "5551234")).expect("valid draft")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryOrderRepository::new();
        let created = repo.create(draft("Margherita")).await.unwrap();

        let fetched = repo.get_by_id(&created.id.to_hex()).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = InMemoryOrderRepository::new();
        let result = repo.get_by_id("65f1c0ffee0000000000abcd").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_malformed_id_is_invalid_id_error() {
        let repo = InMemoryOrderRepository::new();
        let err = repo.get_by_id("zzzzzzzzzzzzzzzzzzzzzzzz").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_status_filter() {
        let repo = InMemoryOrderRepository::new();
        let first = repo.create(draft("Margherita")).await.unwrap();
        let second = repo.create(draft("Pepperoni")).await.unwrap();
        repo.update_status(&first.id.to_hex(), create_order_update(OrderStatus::Ready))
            .await
            .unwrap();

        let all = repo.list_all(&OrderFilter::new()).await.unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let ready = repo.list_all(&OrderFilter::status("listo")).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, first.id);
    }

    #[tokio::test]
    async fn test_list_is_capped() {
        let repo = InMemoryOrderRepository::new();
        for _ in 0..(LIST_LIMIT + 5) {
            repo.create(draft("Margherita")).await.unwrap();
        }
        assert_eq!(repo.len(), LIST_LIMIT + 5);
        assert_eq!(repo.list_all(&OrderFilter::new()).await.unwrap().len(), LIST_LIMIT);
    }

    #[tokio::test]
    async fn test_update_status_outcomes() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.create(draft("Margherita")).await.unwrap();

        let outcome = repo
            .update_status(&order.id.to_hex(), create_order_update(OrderStatus::Delivered))
            .await
            .unwrap();
        assert!(outcome.matched);

        let updated = repo.get_by_id(&order.id.to_hex()).await.unwrap().unwrap();
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert_eq!(updated.created_at, order.created_at);
        assert!(updated.updated_at >= updated.created_at);

        let missing = repo
            .update_status("65f1c0ffee0000000000abcd", create_order_update(OrderStatus::Ready))
            .await
            .unwrap();
        assert!(!missing.matched);
        assert_eq!(missing.modified, 0);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.create(draft("Margherita")).await.unwrap();

        assert_eq!(repo.delete(&order.id.to_hex()).await.unwrap(), 1);
        assert_eq!(repo.delete(&order.id.to_hex()).await.unwrap(), 0);
        assert!(repo.is_empty());
    }
}
