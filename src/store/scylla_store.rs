use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, OrderDraft, OrderStatus};
use super::{sort_newest_first, OrderStore, StoreError};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// Orders live in a single `orders` table keyed by id. There is no native
// change feed consumed here; the reconciler polls `list_orders` instead.
//
// Notes:
// - Listing is a full scan sorted in memory, fine for a demo-sized table.
// - Status updates use `IF EXISTS` so an unknown id does not upsert a
//   half-empty row.
//
// ============================================================================

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, then make sure keyspace and table exist
    pub async fn connect(uri: &str, keyspace: &str) -> anyhow::Result<Self> {
        tracing::info!(uri = %uri, keyspace = %keyspace, "Connecting to ScyllaDB...");

        let session: Session = SessionBuilder::new()
            .known_node(uri)
            .build()
            .await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;

        session.use_keyspace(keyspace, false).await?;

        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    id uuid PRIMARY KEY,
                    customer_name text,
                    product text,
                    quantity int,
                    price double,
                    status text,
                    created_at timestamp,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;

        tracing::info!("✅ Connected to ScyllaDB");

        Ok(Self::new(Arc::new(session)))
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let result = self.session
            .query_unpaged(
                "SELECT id, customer_name, product, quantity, price, status, created_at, updated_at FROM orders",
                &[],
            )
            .await
            .map_err(unavailable)?;

        let rows_result = result.into_rows_result().map_err(unavailable)?;
        let rows = rows_result
            .rows::<(Uuid, String, String, i32, f64, String, DateTime<Utc>, DateTime<Utc>)>()
            .map_err(unavailable)?;

        let mut orders = Vec::new();
        for row in rows {
            let (id, customer_name, product, quantity, price, status, created_at, updated_at) =
                row.map_err(unavailable)?;

            let status = match status.parse::<OrderStatus>() {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(order_id = %id, error = %e, "Skipping order with unreadable status");
                    continue;
                }
            };

            orders.push(Order {
                id,
                customer_name,
                product,
                quantity: quantity.max(0) as u32,
                price,
                status,
                created_at,
                updated_at,
            });
        }

        sort_newest_first(&mut orders);

        Ok(orders)
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        draft.validate()?;

        let order = draft.into_order(Uuid::new_v4(), Utc::now());
        let quantity = i32::try_from(order.quantity)
            .map_err(|_| StoreError::Validation(format!("quantity too large: {}", order.quantity)))?;

        self.session
            .query_unpaged(
                "INSERT INTO orders (id, customer_name, product, quantity, price, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    order.id,
                    &order.customer_name,
                    &order.product,
                    quantity,
                    order.price,
                    order.status.as_str(),
                    order.created_at,
                    order.updated_at,
                ),
            )
            .await
            .map_err(unavailable)?;

        tracing::debug!(order_id = %order.id, "Inserted order");

        Ok(order)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? IF EXISTS",
                (status.as_str(), Utc::now(), id),
            )
            .await
            .map_err(unavailable)?;

        tracing::debug!(order_id = %id, status = %status, "Updated order status");

        Ok(())
    }
}
