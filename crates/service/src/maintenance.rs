//! Background maintenance for a [`DocService`]
//!
//! Each pass runs four independent steps:
//! 1. Verify the change watcher and restart it if it died
//! 2. Remove expired entries from every cache
//! 3. Reclaim key locks that no longer guard anything
//! 4. Pre-warm hot documents whose content is not cached; hot documents
//!    that were deleted are forgotten
//!
//! A failing step is logged and recorded in the [`MaintenanceReport`]; it
//! never prevents later steps or later passes.

use doclib_core::LibraryPath;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::DocService;

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub watcher_restarted: bool,
    pub expired_entries: usize,
    pub reclaimed_locks: usize,
    pub prewarmed: usize,
    /// Hot documents found deleted and no longer tracked
    pub forgotten: usize,
    pub failures: Vec<String>,
}

impl MaintenanceReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs maintenance passes on a fixed interval until cancelled
pub struct MaintenanceScheduler {
    service: Arc<DocService>,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// Scheduler using the service's configured interval
    pub fn new(service: Arc<DocService>) -> Self {
        let interval = service.config().maintenance_interval;
        Self { service, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run passes until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs_f64(), "maintenance scheduler starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("maintenance scheduler shutting down");
                    break;
                }

                _ = interval.tick() => {
                    let report = self.run_once().await;
                    if report.is_clean() {
                        debug!(?report, "maintenance pass complete");
                    } else {
                        warn!(?report, "maintenance pass completed with failures");
                    }
                }
            }
        }
    }

    /// Run a single pass
    pub async fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.service.ensure_watcher() {
            Ok(restarted) => report.watcher_restarted = restarted,
            Err(e) => {
                warn!(error = %e, "change watcher is down");
                report.failures.push(format!("watcher: {e}"));
            }
        }

        report.expired_entries = self.service.cleanup_expired();
        report.reclaimed_locks = self.service.reclaim_locks();

        for path in self.service.prewarm_candidates() {
            let warmed = match LibraryPath::parse(&path) {
                Ok(path) => self.service.load_content(&path).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match warmed {
                Ok(()) => report.prewarmed += 1,
                Err(e) if e.is_not_found() => {
                    debug!(path, "hot document was deleted");
                    self.service.forget_hot(&path);
                    report.forgotten += 1;
                }
                Err(e) => {
                    debug!(path, error = %e, "pre-warming failed");
                    report.failures.push(format!("prewarm {path}: {e}"));
                }
            }
        }

        report
    }
}
