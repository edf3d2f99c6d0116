use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};

/// Last observed record of every order the reconciler has seen.
///
/// Alongside the record it keeps the furthest status ever observed per order,
/// which only moves forward even when the store goes backwards.
///
/// Owned by a single `Reconciler`; entries are never evicted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotCache {
    orders: HashMap<Uuid, Order>,
    furthest: HashMap<Uuid, OrderStatus>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn status_of(&self, id: &Uuid) -> Option<OrderStatus> {
        self.orders.get(id).map(|o| o.status)
    }

    /// Highest status seen for this order across every upsert
    pub fn furthest_status(&self, id: &Uuid) -> Option<OrderStatus> {
        self.furthest.get(id).copied()
    }

    /// Replace the stored record, returning the previous one
    pub fn upsert(&mut self, order: Order) -> Option<Order> {
        let furthest = self.furthest.entry(order.id).or_insert(order.status);
        if order.status > *furthest {
            *furthest = order.status;
        }
        self.orders.insert(order.id, order)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderDraft;
    use chrono::Utc;

    #[test]
    fn test_upsert_replaces_record() {
        let mut cache = SnapshotCache::new();
        let mut order = OrderDraft::new("Alice", "Widget").into_order(Uuid::new_v4(), Utc::now());

        assert!(cache.upsert(order.clone()).is_none());
        assert_eq!(cache.status_of(&order.id), Some(OrderStatus::Pending));

        order.status = OrderStatus::Processing;
        let previous = cache.upsert(order.clone()).unwrap();

        assert_eq!(previous.status, OrderStatus::Pending);
        assert_eq!(cache.get(&order.id), Some(&order));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unknown_order_absent() {
        let cache = SnapshotCache::new();
        let id = Uuid::new_v4();
        assert!(cache.is_empty());
        assert!(cache.get(&id).is_none());
        assert_eq!(cache.status_of(&id), None);
        assert_eq!(cache.furthest_status(&id), None);
    }

    #[test]
    fn test_furthest_status_survives_regression() {
        let mut cache = SnapshotCache::new();
        let mut order = OrderDraft::new("Alice", "Widget").into_order(Uuid::new_v4(), Utc::now());
        order.status = OrderStatus::Shipped;
        cache.upsert(order.clone());

        order.status = OrderStatus::Pending;
        cache.upsert(order.clone());

        assert_eq!(cache.status_of(&order.id), Some(OrderStatus::Pending));
        assert_eq!(cache.furthest_status(&order.id), Some(OrderStatus::Shipped));

        order.status = OrderStatus::Delivered;
        cache.upsert(order.clone());
        assert_eq!(cache.furthest_status(&order.id), Some(OrderStatus::Delivered));
    }
}
