//! Background refresh loop.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::refresh::{RefreshReport, SharedRefresher};

/// Drives refresh cycles on a fixed interval, independent of scrapes.
pub struct RefreshScheduler {
    refresher: SharedRefresher,
    interval: Duration,
    error_backoff: Duration,
}

impl RefreshScheduler {
    pub fn new(refresher: SharedRefresher, config: &RefreshConfig) -> Self {
        Self {
            refresher,
            interval: config.interval(),
            error_backoff: config.error_backoff(),
        }
    }

    /// Run until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            error_backoff_secs = self.error_backoff.as_secs(),
            "Starting refresh scheduler"
        );

        loop {
            let delay = self.delay_after(self.run_cycle().await);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Refresh scheduler stopped");
    }

    /// Run one cycle in its own task so a panic cannot take the loop down.
    ///
    /// Returns `None` when the cycle panicked.
    async fn run_cycle(&self) -> Option<RefreshReport> {
        let refresher = self.refresher.clone();
        match tokio::spawn(async move { refresher.refresh().await }).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Error updating metrics");
                None
            }
        }
    }

    /// Delay before the next cycle.
    ///
    /// A failed fetch already left the store empty and keeps the normal
    /// interval; only a panicked cycle backs off.
    fn delay_after(&self, report: Option<RefreshReport>) -> Duration {
        match report {
            Some(report) => {
                if report.is_failure() {
                    debug!(
                        retry_secs = self.interval.as_secs(),
                        "Refresh failed, retrying at normal interval"
                    );
                }
                self.interval
            }
            None => {
                warn!(
                    backoff_secs = self.error_backoff.as_secs(),
                    "Refresh cycle aborted, backing off"
                );
                self.error_backoff
            }
        }
    }
}
