use std::sync::Arc;
use tokio::sync::broadcast;

use crate::metrics::Metrics;
use crate::models::OrderEvent;

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out broadcaster for order notifications.
///
/// Delivery is best-effort: no replay for late subscribers, no retry, and a
/// subscriber that falls more than the channel capacity behind loses events.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<OrderEvent>,
    metrics: Option<Arc<Metrics>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity);
        Self { sender, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast to everyone currently subscribed; returns how many were reached
    pub fn emit(&self, event: OrderEvent) -> usize {
        let event_type = event.event_name();
        let order_id = event.order().id;

        if let Some(ref metrics) = self.metrics {
            metrics.record_event(event_type);
        }

        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(
                    event_type = %event_type,
                    order_id = %order_id,
                    receivers = receivers,
                    "Broadcast order event"
                );
                receivers
            }
            Err(_) => {
                tracing::debug!(
                    event_type = %event_type,
                    order_id = %order_id,
                    "No subscribers connected, event dropped"
                );
                0
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderDraft;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_event() -> OrderEvent {
        OrderEvent::created(OrderDraft::new("Alice", "Widget").into_order(Uuid::new_v4(), Utc::now()))
    }

    #[tokio::test]
    async fn test_emit_reaches_all_subscribers() {
        let notifier = Notifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        let event = sample_event();
        assert_eq!(notifier.emit(event.clone()), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let notifier = Notifier::new();
        assert_eq!(notifier.emit(sample_event()), 0);

        let mut late = notifier.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        let next = sample_event();
        notifier.emit(next.clone());
        assert_eq!(late.recv().await.unwrap(), next);
    }

    #[tokio::test]
    async fn test_emit_counts_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let notifier = Notifier::new().with_metrics(metrics.clone());

        notifier.emit(sample_event());

        assert_eq!(metrics.events_emitted.with_label_values(&["orderCreated"]).get(), 1);
    }
}
