use std::sync::Arc;

use crate::models::{Order, OrderDraft};
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Order Service - inbound entry points for the CRUD layer
// ============================================================================
//
// Creation only writes to the store. The reconciler discovers the new order
// on its next tick, announces it and schedules its first advance, so a new
// order becomes visible to subscribers within one poll interval.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.store.list_orders().await
    }

    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        draft.validate()?;

        tracing::info!(
            customer = %draft.customer_name,
            product = %draft.product,
            quantity = draft.quantity_or_default(),
            "Creating new order"
        );

        let order = self.store.insert_order(draft).await?;

        tracing::info!(order_id = %order.id, "✅ Order created");

        Ok(order)
    }
}
