//! Health Route

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub detector: ComponentHealth,
    pub alerts: ComponentHealth,
    pub telemetry: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    fn new(status: &str, detail: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            detail,
        }
    }
}

/// Service health; sink problems degrade but never fail the service
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.runtime.read().await.snapshot();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let alerts = if snapshot.alert_failures > 0 {
        ComponentHealth::new(
            "degraded",
            Some(format!("{} playback failures", snapshot.alert_failures)),
        )
    } else {
        ComponentHealth::new("ok", None)
    };
    let telemetry = if snapshot.telemetry_connected {
        ComponentHealth::new("connected", None)
    } else {
        ComponentHealth::new("offline", None)
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            detector: ComponentHealth::new("ok", Some(snapshot.state.as_str().to_string())),
            alerts,
            telemetry,
        },
    })
}
