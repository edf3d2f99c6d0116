use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Order, OrderDraft, OrderStatus};
use super::{sort_newest_first, OrderStore, StoreError};

/// In-process order store.
///
/// Tests can toggle availability to simulate an outage: while unavailable
/// every call fails with `StoreError::Unavailable` and nothing is changed.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    unavailable: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
        tracing::debug!(available = available, "Memory store availability changed");
    }

    /// Insert a record as-is, keeping its id and timestamps
    #[cfg(test)]
    pub async fn seed(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    #[cfg(test)]
    pub async fn get(&self, id: Uuid) -> Option<Order> {
        self.orders.read().await.get(&id).cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.check_available()?;
        let mut orders: Vec<Order> = self.orders.read().await.values().cloned().collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        self.check_available()?;
        draft.validate()?;

        let order = draft.into_order(Uuid::new_v4(), Utc::now());
        self.orders.write().await.insert(order.id, order.clone());

        tracing::debug!(order_id = %order.id, "Inserted order into memory store");
        Ok(order)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
            }
            None => {
                tracing::debug!(order_id = %id, "Status update for unknown order ignored");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order_created_at(name: &str, minutes_ago: i64) -> Order {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        OrderDraft::new(name, "Widget").into_order(Uuid::new_v4(), at)
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_pending_status() {
        let store = MemoryOrderStore::new();
        let order = store
            .insert_order(OrderDraft::new("Alice", "Widget").with_quantity(2).with_price(9.99))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(order.quantity, 2);
        assert_eq!(store.get(order.id).await, Some(order));
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_draft() {
        let store = MemoryOrderStore::new();
        let result = store.insert_order(OrderDraft::new("", "Widget")).await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryOrderStore::new();
        store.seed(order_created_at("old", 10)).await;
        store.seed(order_created_at("newest", 1)).await;
        store.seed(order_created_at("middle", 5)).await;

        let names: Vec<String> = store
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.customer_name)
            .collect();

        assert_eq!(names, vec!["newest", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_update_status_bumps_updated_at() {
        let store = MemoryOrderStore::new();
        let seeded = order_created_at("Alice", 3);
        store.seed(seeded.clone()).await;

        store.update_status(seeded.id, OrderStatus::Processing).await.unwrap();

        let stored = store.get(seeded.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
        assert!(stored.updated_at > seeded.updated_at);
        assert_eq!(stored.created_at, seeded.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_order_is_noop() {
        let store = MemoryOrderStore::new();
        assert!(store.update_status(Uuid::new_v4(), OrderStatus::Shipped).await.is_ok());
        assert!(store.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryOrderStore::new();
        store.set_available(false);

        assert!(matches!(store.list_orders().await, Err(StoreError::Unavailable(_))));
        assert!(store.insert_order(OrderDraft::new("Alice", "Widget")).await.is_err());
        assert!(store.update_status(Uuid::new_v4(), OrderStatus::Shipped).await.is_err());

        store.set_available(true);
        assert!(store.list_orders().await.is_ok());
    }
}
