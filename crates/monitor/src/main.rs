//! Drowsiness Monitor - Main Entry Point
//!
//! Usage: `face-detector | drowsiness-monitor [--config monitor.toml]`

use anyhow::Context;
use monitor::{init_logging, run, Settings};
use std::path::PathBuf;
use tracing::info;

fn config_path() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config requires a path")?;
            return Ok(Some(PathBuf::from(path)));
        }
        anyhow::bail!("Unknown argument: {}", arg);
    }
    Ok(std::env::var_os("MONITOR_CONFIG").map(PathBuf::from))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path()?;
    let settings = Settings::load(path.as_deref()).context("Failed to load settings")?;
    init_logging(&settings.log)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "EAR threshold {:.2}, alert after {:.1}s closed, sampling at {} fps",
        settings.detection.ear_threshold,
        settings.detection.closed_duration_secs,
        settings.scheduler.fps
    );

    run(settings).await
}
