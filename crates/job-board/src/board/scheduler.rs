//! Periodic expiry sweep.
//!
//! Runs the sweep on a fixed interval, on demand through [`SweepScheduler::trigger`],
//! and optionally once at startup. Each pass also retries applications whose
//! joint release did not finish earlier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::expiry::SweepReport;
use super::service::{BoardError, JobBoardService};

pub struct SweepScheduler {
    service: Arc<JobBoardService>,
    interval: Duration,
    run_on_startup: bool,
    wake: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    pub fn new(service: Arc<JobBoardService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_millis(1)),
            run_on_startup: false,
            wake: Arc::new(Notify::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_on_startup(mut self, enabled: bool) -> Self {
        self.run_on_startup = enabled;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawns the sweep loop on the current runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let wake = Arc::clone(&self.wake);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let run_on_startup = self.run_on_startup;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer.tick().await; // first tick completes immediately

            info!(interval_secs = interval.as_secs(), run_on_startup, "expiry sweep scheduler started");
            if run_on_startup {
                run_pass(Arc::clone(&service)).await;
            }

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                run_pass(Arc::clone(&service)).await;
            }
            info!("expiry sweep scheduler stopped");
        })
    }

    /// Requests an out-of-schedule pass.
    pub fn trigger(&self) {
        info!("manual expiry sweep requested");
        self.wake.notify_one();
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

/// One sweep followed by the deferred-release repair pass. Failures are
/// logged; the next tick tries again.
pub async fn run_pass(service: Arc<JobBoardService>) -> Option<SweepReport> {
    let result = tokio::task::spawn_blocking(move || {
        let now = Utc::now();
        let report = service.sweep_expired_jobs(now);
        if let Err(err) = service.release_pending() {
            warn!(error = %err, "deferred application release failed");
        }
        report
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            if report.is_partial() {
                warn!(
                    removed = report.removed_count(),
                    failed = report.failures.len(),
                    "expiry sweep finished with failures"
                );
            }
            Some(report)
        }
        Ok(Err(BoardError::SweepInProgress)) => {
            info!("expiry sweep skipped; another pass is running");
            None
        }
        Ok(Err(err)) => {
            error!(error = %err, "expiry sweep failed");
            None
        }
        Err(err) => {
            error!(error = %err, "expiry sweep task did not complete");
            None
        }
    }
}
