use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::metrics::Metrics;
use crate::models::{Order, OrderStatus};
use crate::store::OrderStore;

// ============================================================================
// Progression Engine - timed automatic status advances
// ============================================================================
//
// Each order has at most one pending advance, keyed by order id:
// - pending    -> processing after `pending_delay`, only when the order is
//                 first announced
// - processing -> shipped, shipped -> delivered after `stage_delay`, when a
//                 status change is observed
// - delivered is terminal
//
// A request for an order that already has an advance pending from the same
// status is ignored. A pending advance from a different status is stale (the
// order moved on without it) and gets aborted and replaced.
//
// A failed store write is logged and dropped. There is no retry.
//
// ============================================================================

struct PendingAdvance {
    from: OrderStatus,
    ticket: u64,
    handle: JoinHandle<()>,
}

pub struct ProgressionEngine {
    store: Arc<dyn OrderStore>,
    pending_delay: Duration,
    stage_delay: Duration,
    pending: Arc<Mutex<HashMap<Uuid, PendingAdvance>>>,
    next_ticket: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl ProgressionEngine {
    pub fn new(store: Arc<dyn OrderStore>, config: &TrackerConfig) -> Self {
        Self {
            store,
            pending_delay: config.pending_delay,
            stage_delay: config.stage_delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// First advance of a freshly created order. Returns whether one was scheduled.
    pub async fn schedule_initial(&self, order: &Order) -> bool {
        match order.status {
            OrderStatus::Pending => self.schedule(order.id, order.status, self.pending_delay).await,
            _ => false,
        }
    }

    /// Next advance after an observed status change. Returns whether one was scheduled.
    pub async fn schedule_next(&self, order: &Order) -> bool {
        match order.status {
            OrderStatus::Processing | OrderStatus::Shipped => {
                self.schedule(order.id, order.status, self.stage_delay).await
            }
            OrderStatus::Pending | OrderStatus::Delivered => {
                self.cancel_stale(order.id, order.status).await;
                false
            }
        }
    }

    pub async fn cancel(&self, id: Uuid) -> bool {
        let removed = self.pending.lock().await.remove(&id);
        match removed {
            Some(advance) => {
                advance.handle.abort();
                self.record("cancelled");
                tracing::debug!(order_id = %id, from = %advance.from, "Cancelled pending advance");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub async fn is_pending(&self, id: Uuid) -> bool {
        self.pending.lock().await.contains_key(&id)
    }

    /// Number of orders with an advance waiting to fire
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Abort every pending advance
    pub async fn shutdown(&self) {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        for (_, advance) in pending.drain() {
            advance.handle.abort();
        }
        tracing::info!(aborted = count, "🛑 Progression engine stopped");
    }

    async fn cancel_stale(&self, id: Uuid, current: OrderStatus) {
        let stale = {
            let pending = self.pending.lock().await;
            pending.get(&id).map_or(false, |advance| advance.from != current)
        };
        if stale {
            self.cancel(id).await;
        }
    }

    async fn schedule(&self, id: Uuid, from: OrderStatus, delay: Duration) -> bool {
        let Some(to) = from.next() else {
            return false;
        };

        let mut pending = self.pending.lock().await;

        if let Some(existing) = pending.get(&id) {
            if existing.from == from {
                tracing::debug!(order_id = %id, from = %from, "⏭️  Advance already pending");
                return false;
            }
            tracing::debug!(
                order_id = %id,
                stale_from = %existing.from,
                from = %from,
                "Replacing stale pending advance"
            );
            if let Some(stale) = pending.remove(&id) {
                stale.handle.abort();
                self.record("cancelled");
            }
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let store = self.store.clone();
        let registry = self.pending.clone();
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            sleep(delay).await;

            // Leave the registry before writing; a superseded ticket means
            // this advance was replaced while sleeping.
            {
                let mut pending = registry.lock().await;
                match pending.get(&id) {
                    Some(advance) if advance.ticket == ticket => {
                        pending.remove(&id);
                    }
                    _ => return,
                }
            }

            match store.update_status(id, to).await {
                Ok(()) => {
                    tracing::info!(order_id = %id, from = %from, to = %to, "⏩ Advanced order status");
                    if let Some(ref metrics) = metrics {
                        metrics.record_advance("advanced");
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        order_id = %id,
                        from = %from,
                        to = %to,
                        "❌ Failed to advance order status, dropping advance"
                    );
                    if let Some(ref metrics) = metrics {
                        metrics.record_advance("failed");
                    }
                }
            }
        });

        pending.insert(id, PendingAdvance { from, ticket, handle });

        tracing::debug!(
            order_id = %id,
            from = %from,
            to = %to,
            delay_ms = delay.as_millis(),
            "Scheduled automatic advance"
        );

        true
    }

    fn record(&self, outcome: &str) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_advance(outcome);
        }
    }
}
