//! Gated sample scheduler implementation

use dms::TransmissionGate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::SchedulerError;

/// Configuration for the sample scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capture rate in frames per second (default: 1.0)
    pub fps: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { fps: 1.0 }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.fps.is_finite() && self.fps > 0.0 {
            Ok(())
        } else {
            Err(SchedulerError::InvalidRate(self.fps))
        }
    }

    /// Tick period, rounded to whole milliseconds
    pub fn interval(&self) -> Duration {
        let millis = (1000.0 / self.fps).round().max(1.0);
        Duration::from_millis(millis as u64)
    }
}

/// Something the scheduler can capture from on each tick
pub trait SampleSource: Send {
    type Sample: Send;

    /// Capture the current sample; `None` while the source is not ready
    fn capture(&mut self) -> Option<Self::Sample>;
}

impl<S, F> SampleSource for F
where
    F: FnMut() -> Option<S> + Send,
    S: Send,
{
    type Sample = S;

    fn capture(&mut self) -> Option<S> {
        self()
    }
}

/// Tick outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub forwarded: u64,
    /// Ticks skipped because the gate was closed
    pub gated: u64,
    /// Ticks skipped because the source had nothing to capture
    pub not_ready: u64,
    /// Samples dropped because the downstream channel was full
    pub dropped: u64,
}

/// Stops a running scheduler from another task
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Fixed-rate scheduler forwarding samples while the gate is open
pub struct SampleScheduler {
    config: SchedulerConfig,
    gate: TransmissionGate,
    stop: StopHandle,
    stats: SchedulerStats,
}

impl SampleScheduler {
    pub fn new(config: SchedulerConfig, gate: TransmissionGate) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            config,
            gate,
            stop: StopHandle::default(),
            stats: SchedulerStats::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run until stopped or until the receiver goes away
    pub async fn run<S>(&mut self, mut source: S, tx: mpsc::Sender<S::Sample>) -> SchedulerStats
    where
        S: SampleSource,
    {
        let period = self.config.interval();
        info!(
            "Starting sample scheduler at {} fps ({}ms)",
            self.config.fps,
            period.as_millis()
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut was_open = true;

        while !self.stop.is_stopped() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop.notify.notified() => break,
            }
            self.stats.ticks += 1;

            let open = self.gate.is_open();
            if open != was_open {
                if open {
                    info!("Transmission gate open, forwarding resumed");
                } else {
                    info!("Transmission gate closed, forwarding paused");
                }
                was_open = open;
            }
            if !open {
                self.stats.gated += 1;
                metrics::counter!("scheduler_samples_gated_total").increment(1);
                continue;
            }

            let Some(sample) = source.capture() else {
                self.stats.not_ready += 1;
                continue;
            };

            match tx.try_send(sample) {
                Ok(()) => {
                    self.stats.forwarded += 1;
                    metrics::counter!("scheduler_samples_forwarded_total").increment(1);
                }
                Err(TrySendError::Full(_)) => {
                    debug!("Sample channel full, dropping sample");
                    self.stats.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    info!("Sample receiver closed");
                    break;
                }
            }
        }

        info!("Sample scheduler stopped: {:?}", self.stats);
        self.stats.clone()
    }
}
