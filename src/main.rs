use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*};

mod api;
mod config;
mod metrics;
mod models;
mod service;
mod store;
mod tracking;

use config::{Config, StoreKind};
use store::{MemoryOrderStore, OrderStore, ScyllaOrderStore};
use tracking::{Notifier, ProgressionEngine, Reconciler, TrackerHealth};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG set there reaches the filter
    dotenvy::dotenv().ok();

    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(config::log_filter(|key| std::env::var(key).ok()))
        .init();

    let config = Config::from_env();

    tracing::info!("🚀 Starting order tracker");
    tracing::info!(
        poll_interval_ms = config.tracker.poll_interval.as_millis(),
        pending_delay_ms = config.tracker.pending_delay.as_millis(),
        stage_delay_ms = config.tracker.stage_delay.as_millis(),
        store = ?config.store,
        "Loaded configuration"
    );

    // === 1. Order store ===
    let store: Arc<dyn OrderStore> = match config.store {
        StoreKind::Scylla => {
            Arc::new(ScyllaOrderStore::connect(&config.scylla_uri, &config.scylla_keyspace).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory order store, orders are lost on restart");
            Arc::new(MemoryOrderStore::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Tracking core ===
    let notifier = Notifier::new().with_metrics(metrics.clone());
    let progression = Arc::new(
        ProgressionEngine::new(store.clone(), &config.tracker).with_metrics(metrics.clone()),
    );
    let health = TrackerHealth::new();

    let reconciler = Reconciler::new(
        store.clone(),
        notifier.clone(),
        progression.clone(),
        config.tracker.poll_interval,
    )
    .with_metrics(metrics.clone())
    .with_health(health.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconcile_loop = tokio::spawn(reconciler.run(shutdown_rx));

    // === 4. HTTP API (runs until ctrl-c) ===
    let state = api::AppState {
        service: service::OrderService::new(store.clone()),
        notifier,
        health,
        progression: progression.clone(),
        metrics,
    };
    let served = api::start_server(state, config.port, config.cors_origin.clone()).await;

    // === 5. Shutdown ===
    tracing::info!("🛑 Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = reconcile_loop.await {
        tracing::error!(error = %e, "Reconciliation loop ended abnormally");
    }
    progression.shutdown().await;

    served?;
    Ok(())
}
