// ============================================================================
// Store Adapter
// ============================================================================
//
// The order store is the single source of truth. The tracking core only
// needs three primitives from it:
// - list every order, newest first
// - insert a new order (always starts as pending)
// - set the status of an existing order
//
// Two adapters are provided:
// - scylla_store - ScyllaDB backed, for running the service
// - memory       - in-process, for local runs and tests (with fault injection)
//
// ============================================================================

mod memory;
mod scylla_store;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Order, OrderDraft, OrderStatus};

pub use memory::MemoryOrderStore;
pub use scylla_store::ScyllaOrderStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid order: {0}")]
    Validation(String),

    #[allow(dead_code)]
    #[error("Order not found: {0}")]
    NotFound(Uuid),
}

impl StoreError {
    /// Unavailability is transient; the next tick may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders sorted by `created_at` descending
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Persist a new pending order and return it with its assigned id
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    /// Set `status` and bump `updated_at`. Unknown ids are a silent no-op.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError>;
}

pub(crate) fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
