use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

// ============================================================================
// Tracker Health
// ============================================================================
//
// The reconciler reports the outcome of every tick here. A failed tick marks
// the tracker degraded until the next successful one; subscribers get no
// error events, so this is the only place an outage is visible.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Shared, cloneable view of the reconciler's health
#[derive(Clone)]
pub struct TrackerHealth {
    inner: Arc<RwLock<ComponentHealth>>,
}

impl Default for TrackerHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerHealth {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(
                ComponentHealth::new("reconciler", HealthStatus::Unhealthy("no tick yet".to_string())),
            )),
        }
    }

    pub async fn record_success(&self, tracked: usize) {
        let health = ComponentHealth::new("reconciler", HealthStatus::Healthy)
            .with_details(format!("{} orders tracked", tracked));
        *self.inner.write().await = health;
    }

    pub async fn record_failure(&self, error: impl std::fmt::Display) {
        let health = ComponentHealth::new(
            "reconciler",
            HealthStatus::Degraded(format!("last tick failed: {}", error)),
        );
        *self.inner.write().await = health;
    }

    pub async fn snapshot(&self) -> ComponentHealth {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_follows_tick_outcomes() {
        let health = TrackerHealth::new();
        assert!(!health.snapshot().await.status.is_healthy());

        health.record_success(3).await;
        let snapshot = health.snapshot().await;
        assert!(snapshot.status.is_healthy());
        assert_eq!(snapshot.details.as_deref(), Some("3 orders tracked"));

        health.record_failure("connection refused").await;
        assert!(matches!(health.snapshot().await.status, HealthStatus::Degraded(_)));
    }

    #[test]
    fn test_health_json_shape() {
        let json = serde_json::to_value(ComponentHealth::new(
            "reconciler",
            HealthStatus::Degraded("store down".to_string()),
        ))
        .unwrap();

        assert_eq!(json["status"]["state"], "degraded");
        assert_eq!(json["status"]["reason"], "store down");
        assert_eq!(json["name"], "reconciler");
    }
}
