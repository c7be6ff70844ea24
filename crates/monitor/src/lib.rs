//! Drowsiness Monitor Service
//!
//! Reads face-detector frames from stdin, runs the drowsiness detector,
//! raises alerts, forwards telemetry and serves a small status API.

use alerting::AlertDispatcher;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dms::{DrowsinessMonitor, LandmarkFrame};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sample_scheduler::SampleScheduler;
use std::sync::Arc;
use telemetry::{MqttTransport, OfflineTransport, TelemetryForwarder, TelemetryTransport};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod ingest;
pub mod routes;
pub mod runtime;
pub mod settings;

pub use ingest::{ingest_lines, IngestStats};
pub use runtime::{forward_samples, LatestFrameSource, MonitorRuntime, StatusSnapshot};
pub use settings::{LogConfig, ServerConfig, Settings, SettingsError};

/// Scheduled samples waiting for the telemetry link
const SAMPLE_QUEUE: usize = 8;

/// Application state shared across handlers
pub struct AppState {
    pub runtime: Arc<RwLock<MonitorRuntime>>,
    pub version: String,
    pub start_time: std::time::Instant,
    /// Prometheus renderer, absent when no recorder could be installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(runtime: Arc<RwLock<MonitorRuntime>>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            runtime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Initialize logging to stderr; stdout stays free for the detector pipe
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let level = config
        .level
        .parse::<Level>()
        .with_context(|| format!("Unknown log level: {}", config.level))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn telemetry_transport(settings: &Settings) -> Arc<dyn TelemetryTransport> {
    if settings.telemetry.enabled {
        Arc::new(MqttTransport::connect(&settings.telemetry))
    } else {
        info!("Telemetry disabled");
        Arc::new(OfflineTransport)
    }
}

/// Run one detection session until stdin closes or Ctrl-C
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder unavailable: {}", e);
            None
        }
    };

    let telemetry = Arc::new(TelemetryForwarder::new(telemetry_transport(&settings)));
    let monitor = DrowsinessMonitor::new(settings.detection.clone())?;
    let alerts = AlertDispatcher::from_config(&settings.alert);

    let mut runtime = MonitorRuntime::new(monitor, alerts, telemetry.clone());
    runtime.start_session();
    let gate = runtime.gate();
    let runtime = Arc::new(RwLock::new(runtime));

    // Sample path: latest frame -> gated scheduler -> telemetry
    let (latest_tx, latest_rx) = watch::channel::<Option<LandmarkFrame>>(None);
    let (sample_tx, sample_rx) = mpsc::channel::<LandmarkFrame>(SAMPLE_QUEUE);
    let mut scheduler = SampleScheduler::new(settings.scheduler.clone(), gate.clone())?;
    let stop = scheduler.stop_handle();
    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run(LatestFrameSource::new(latest_rx), sample_tx)
            .await
    });
    let forward_task = tokio::spawn(forward_samples(sample_rx, gate, telemetry));

    let server_task = if settings.server.enabled {
        let app = create_router(Arc::new(AppState::new(runtime.clone(), metrics)));
        let listener = tokio::net::TcpListener::bind(&settings.server.addr).await?;
        info!("Status API listening on {}", settings.server.addr);
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Status API failed: {}", e);
            }
        }))
    } else {
        None
    };

    let input = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = ingest_lines(input, &runtime, &latest_tx) => {
            let stats = result?;
            info!(
                "Input closed after {} frames ({} malformed, {} rejected)",
                stats.frames, stats.malformed, stats.rejected
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    runtime.write().await.stop_session();
    stop.stop();
    let scheduler_stats = scheduler_task.await?;
    let withheld = forward_task.await?;
    if let Some(server) = server_task {
        server.abort();
    }

    info!(
        "Scheduler forwarded {} samples, {} gated, {} withheld after queueing",
        scheduler_stats.forwarded, scheduler_stats.gated, withheld
    );
    Ok(())
}
