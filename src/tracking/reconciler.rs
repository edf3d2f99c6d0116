use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::metrics::Metrics;
use crate::models::{Order, OrderEvent};
use crate::store::{OrderStore, StoreError};
use super::{Notifier, ProgressionEngine, SnapshotCache, TrackerHealth};

// ============================================================================
// Reconciler - snapshot-diff change detection over a polled store
// ============================================================================
//
// The store has no change feed, so every tick:
// 1. Fetches all orders (newest first)
// 2. Classifies each against the snapshot cache:
//    - new:     not cached and created after the previous tick's boundary
//    - changed: cached with a different status that is past the furthest
//               status ever observed for that order
// 3. Broadcasts statusUpdated for changes and hands them to the progression
//    engine, then broadcasts orderCreated for new orders and schedules their
//    first advance
// 4. Refreshes the cache with every fetched record and moves the boundary
//
// A store that moves an order backwards is mirrored in the cache but never
// announced, and neither is its walk forward again through stages already
// seen. Subscribers only ever see an order move past its furthest stage.
//
// A failed fetch aborts the tick before anything is touched, so the next
// successful tick sees every change accumulated since the last good one.
//
// Ticks never overlap: the loop sleeps for the poll interval after each tick
// finishes.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
}

enum Change {
    New,
    StatusChanged,
    Unchanged,
}

pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    progression: Arc<ProgressionEngine>,
    cache: SnapshotCache,
    last_tick: DateTime<Utc>,
    poll_interval: Duration,
    health: TrackerHealth,
    metrics: Option<Arc<Metrics>>,
}

impl Reconciler {
    /// Orders created before this call are never announced as new
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Notifier,
        progression: Arc<ProgressionEngine>,
        poll_interval: Duration,
    ) -> Self {
        Self::watching_since(store, notifier, progression, poll_interval, Utc::now())
    }

    /// Start watching with an explicit creation-time boundary
    pub fn watching_since(
        store: Arc<dyn OrderStore>,
        notifier: Notifier,
        progression: Arc<ProgressionEngine>,
        poll_interval: Duration,
        since: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            notifier,
            progression,
            cache: SnapshotCache::new(),
            last_tick: since,
            poll_interval,
            health: TrackerHealth::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_health(mut self, health: TrackerHealth) -> Self {
        self.health = health;
        self
    }

    #[cfg(test)]
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn last_tick(&self) -> DateTime<Utc> {
        self.last_tick
    }

    #[cfg(test)]
    pub fn health(&self) -> TrackerHealth {
        self.health.clone()
    }

    fn classify(&self, order: &Order) -> Change {
        match self.cache.get(&order.id) {
            None if order.created_at > self.last_tick => Change::New,
            Some(cached) if cached.status != order.status => {
                let furthest = self.cache.furthest_status(&order.id).unwrap_or(cached.status);
                if order.status <= furthest {
                    tracing::warn!(
                        order_id = %order.id,
                        previous = %cached.status,
                        current = %order.status,
                        furthest = %furthest,
                        "Order status is behind a stage already seen, not announcing"
                    );
                    Change::Unchanged
                } else {
                    Change::StatusChanged
                }
            }
            _ => Change::Unchanged,
        }
    }

    /// Run one reconcile-and-notify cycle
    pub async fn tick(&mut self) -> Result<TickReport, StoreError> {
        let started = Instant::now();
        // Taken before the fetch: anything created after this point is not
        // in the snapshot and must still count as new next tick.
        let boundary = Utc::now();

        let orders = match self.store.list_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch orders, skipping tick");
                self.health.record_failure(&e).await;
                if let Some(ref metrics) = self.metrics {
                    metrics.record_tick(started.elapsed().as_secs_f64(), false);
                }
                return Err(e);
            }
        };

        let first_snapshot = self.cache.is_empty();
        let mut created = Vec::new();
        let mut changed = Vec::new();
        for order in &orders {
            match self.classify(order) {
                Change::New => created.push(order),
                Change::StatusChanged => changed.push(order),
                Change::Unchanged => {}
            }
        }

        for order in &changed {
            if let Some(previous) = self.cache.status_of(&order.id) {
                tracing::info!(
                    order_id = %order.id,
                    from = %previous,
                    to = %order.status,
                    "🔄 Status changed"
                );
            }
            self.notifier.emit(OrderEvent::status_updated((*order).clone()));
            self.progression.schedule_next(order).await;
        }

        for order in &created {
            tracing::info!(
                order_id = %order.id,
                customer = %order.customer_name,
                product = %order.product,
                "📦 New order"
            );
            self.notifier.emit(OrderEvent::created((*order).clone()));
            self.progression.schedule_initial(order).await;
        }

        let report = TickReport {
            fetched: orders.len(),
            created: created.len(),
            updated: changed.len(),
        };

        for order in orders {
            self.cache.upsert(order);
        }
        self.last_tick = boundary;

        if first_snapshot && !self.cache.is_empty() {
            tracing::info!(tracked = self.cache.len(), "📸 Initial order snapshot taken");
        }

        self.health.record_success(self.cache.len()).await;
        if let Some(ref metrics) = self.metrics {
            metrics.record_tick(started.elapsed().as_secs_f64(), true);
            metrics.set_tracked_orders(self.cache.len());
        }

        if report.created > 0 || report.updated > 0 {
            tracing::debug!(
                fetched = report.fetched,
                created = report.created,
                updated = report.updated,
                "Tick complete"
            );
        }

        Ok(report)
    }

    /// Tick until `shutdown` flips to true, sleeping between ticks
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis(),
            "🔄 Starting order reconciliation loop"
        );

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            // Failures are already logged; the next tick retries from the same state
            if let Err(e) = self.tick().await {
                if !e.is_transient() {
                    tracing::warn!(error = %e, "Non-transient store error, will keep polling");
                }
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("🛑 Reconciliation loop stopped");
    }
}
