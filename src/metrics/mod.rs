use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for the tracking core
// ============================================================================
//
// Covers:
// - Reconciliation ticks (outcome, duration)
// - Notifications emitted by event type
// - Automatic progression advances (fired, failed, cancelled)
// - Size of the snapshot cache
//
// Exposed as text via GET /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Reconciler
    pub reconcile_ticks: IntCounterVec,
    pub reconcile_tick_duration: Histogram,
    pub tracked_orders: IntGauge,

    // Notifier
    pub events_emitted: IntCounterVec,

    // Progression engine
    pub progression_advances: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let reconcile_ticks = IntCounterVec::new(
            Opts::new("reconcile_ticks_total", "Reconciliation ticks by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reconcile_ticks.clone()))?;

        let reconcile_tick_duration = Histogram::with_opts(
            HistogramOpts::new("reconcile_tick_duration_seconds", "Reconciliation tick duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(reconcile_tick_duration.clone()))?;

        let tracked_orders = IntGauge::new(
            "tracked_orders",
            "Orders held in the reconciler snapshot cache",
        )?;
        registry.register(Box::new(tracked_orders.clone()))?;

        let events_emitted = IntCounterVec::new(
            Opts::new("order_events_emitted_total", "Notifications broadcast to subscribers"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_emitted.clone()))?;

        let progression_advances = IntCounterVec::new(
            Opts::new("progression_advances_total", "Automatic status advances by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(progression_advances.clone()))?;

        Ok(Self {
            registry,
            reconcile_ticks,
            reconcile_tick_duration,
            tracked_orders,
            events_emitted,
            progression_advances,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_tick(&self, duration_secs: f64, success: bool) {
        let outcome = if success { "ok" } else { "store_error" };
        self.reconcile_ticks.with_label_values(&[outcome]).inc();
        self.reconcile_tick_duration.observe(duration_secs);
    }

    pub fn record_event(&self, event_type: &str) {
        self.events_emitted.with_label_values(&[event_type]).inc();
    }

    /// outcome is one of "advanced", "failed", "cancelled"
    pub fn record_advance(&self, outcome: &str) {
        self.progression_advances.with_label_values(&[outcome]).inc();
    }

    pub fn set_tracked_orders(&self, count: usize) {
        self.tracked_orders.set(count as i64);
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
