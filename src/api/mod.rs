use actix_cors::Cors;
use actix_web::http::{header, StatusCode};
use actix_web::{web, App, HttpResponse, HttpServer, Responder, ResponseError};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

use crate::metrics::Metrics;
use crate::models::{OrderDraft, OrderEvent};
use crate::service::OrderService;
use crate::store::StoreError;
use crate::tracking::{Notifier, ProgressionEngine, TrackerHealth};

// ============================================================================
// HTTP API
// ============================================================================
//
// Routes:
// - GET  /api/orders  - all orders, newest first
// - POST /api/orders  - create an order from a draft
// - GET  /api/events  - Server-Sent Events stream of order notifications
// - GET  /health      - reconciler health
// - GET  /metrics     - Prometheus text format
//
// Every route sits behind CORS allowing one configured browser origin.
//
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    pub notifier: Notifier,
    pub health: TrackerHealth,
    pub progression: Arc<ProgressionEngine>,
    pub metrics: Arc<Metrics>,
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/orders", web::get().to(list_orders))
        .route("/api/orders", web::post().to(create_order))
        .route("/api/events", web::get().to(events))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// CORS for the browser frontend; `*` opens the API to any origin
pub fn cors(origin: &str) -> Cors {
    let cors = if origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        Cors::default().allowed_origin(origin)
    };
    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

/// Start the HTTP server and run until it is stopped
pub async fn start_server(state: AppState, port: u16, cors_origin: String) -> std::io::Result<()> {
    tracing::info!("🌐 Starting HTTP server on http://0.0.0.0:{}", port);
    tracing::info!(origin = %cors_origin, "CORS origin allowed");

    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_origin))
            .app_data(data.clone())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn list_orders(state: web::Data<AppState>) -> Result<HttpResponse, StoreError> {
    let orders = state.service.list_orders().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list orders");
        e
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn create_order(
    state: web::Data<AppState>,
    draft: web::Json<OrderDraft>,
) -> Result<HttpResponse, StoreError> {
    let order = state.service.create_order(draft.into_inner()).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to create order");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

async fn events(state: web::Data<AppState>) -> impl Responder {
    let rx = state.notifier.subscribe();
    tracing::info!(subscribers = state.notifier.subscriber_count(), "🔌 Client subscribed");

    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(event) => sse_frame(&event).map(|frame| Ok::<_, Infallible>(web::Bytes::from(frame))),
            Err(e) => {
                // lagged behind the channel; best-effort delivery skips ahead
                tracing::warn!(error = %e, "Subscriber lagged, events skipped");
                None
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

/// One Server-Sent Events frame: event name plus JSON payload
fn sse_frame(event: &OrderEvent) -> Option<String> {
    let data = serde_json::to_string(event).ok()?;
    Some(format!("event: {}\ndata: {}\n\n", event.event_name(), data))
}

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    let health = state.health.snapshot().await;
    let pending_advances = state.progression.pending_count().await;
    let status = if health.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    HttpResponse::build(status).json(serde_json::json!({
        "service": "order-tracker",
        "reconciler": health,
        "subscribers": state.notifier.subscriber_count(),
        "pendingAdvances": pending_advances,
    }))
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.encode() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
