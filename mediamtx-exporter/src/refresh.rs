//! The fetch → parse → store cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::UpstreamError;
use crate::fetcher::Fetcher;
use crate::filter::MetricFilter;
use crate::parser;
use crate::snapshot::Snapshot;
use crate::store::SharedStore;

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshReport {
    /// Upstream answered; the store now holds this many samples.
    Updated {
        samples: usize,
        skipped: usize,
        filtered: usize,
        duration: Duration,
    },
    /// Upstream failed; the store was cleared.
    Failed { error: UpstreamError, duration: Duration },
    /// Another cycle was already running; its result is in the store.
    Coalesced,
}

impl RefreshReport {
    pub fn is_failure(&self) -> bool {
        matches!(self, RefreshReport::Failed { .. })
    }
}

/// Refresh statistics.
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    /// Cycles that actually contacted the upstream.
    pub cycles: u64,
    /// Cycles that stored a new snapshot.
    pub successes: u64,
    /// Cycles that cleared the store.
    pub failures: u64,
    /// Triggers that joined an in-flight cycle.
    pub coalesced: u64,
    /// Malformed lines skipped across all cycles.
    pub lines_skipped: u64,
}

/// Runs refresh cycles against a store, one at a time.
pub struct Refresher {
    fetcher: Fetcher,
    filter: MetricFilter,
    store: SharedStore,
    in_flight: Mutex<()>,
    stats: RwLock<RefreshStats>,
}

impl Refresher {
    pub fn new(fetcher: Fetcher, filter: MetricFilter, store: SharedStore) -> Self {
        Self {
            fetcher,
            filter,
            store,
            in_flight: Mutex::new(()),
            stats: RwLock::new(RefreshStats::default()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Get refresh statistics.
    pub fn stats(&self) -> RefreshStats {
        self.stats.read().clone()
    }

    /// Run one cycle.
    ///
    /// If a cycle is already in flight this waits for it and returns
    /// [`RefreshReport::Coalesced`] without contacting the upstream again.
    pub async fn refresh(&self) -> RefreshReport {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _wait = self.in_flight.lock().await;
                self.stats.write().coalesced += 1;
                debug!("Joined in-flight refresh");
                return RefreshReport::Coalesced;
            }
        };

        let started = Instant::now();
        let outcome = self.fetcher.fetch().await;

        let report = match outcome {
            Ok(text) => {
                let parsed = parser::parse(&text);
                let mut snapshot = parsed.snapshot;
                let filtered = self.filter.apply(&mut snapshot);
                let samples = snapshot.len();

                if samples == 0 && filtered > 0 {
                    warn!(
                        filtered,
                        "Filters removed every sample; exporter will report itself down"
                    );
                } else if samples == 0 {
                    warn!("No metrics data received from MediaMTX");
                }
                self.store.replace(snapshot);

                RefreshReport::Updated {
                    samples,
                    skipped: parsed.skipped,
                    filtered,
                    duration: started.elapsed(),
                }
            }
            Err(error) => {
                self.store.replace(Snapshot::empty());
                RefreshReport::Failed {
                    error,
                    duration: started.elapsed(),
                }
            }
        };

        let mut stats = self.stats.write();
        stats.cycles += 1;
        match &report {
            RefreshReport::Updated {
                samples,
                skipped,
                filtered,
                duration,
            } => {
                stats.successes += 1;
                stats.lines_skipped += *skipped as u64;
                info!(
                    samples,
                    skipped,
                    filtered,
                    duration_ms = duration.as_millis() as u64,
                    "Parsed MediaMTX metrics"
                );
            }
            RefreshReport::Failed { error, duration } => {
                stats.failures += 1;
                debug!(
                    kind = error.kind(),
                    duration_ms = duration.as_millis() as u64,
                    "Refresh failed, snapshot cleared"
                );
            }
            RefreshReport::Coalesced => {}
        }

        report
    }
}

/// Create a shareable refresher handle.
pub type SharedRefresher = Arc<Refresher>;
