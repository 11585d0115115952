//! Background refresher for the snapshot cache.
//!
//! Fetches a new snapshot every `ttl` and publishes it to the shared slot.
//! Failures are logged and retried at the next tick, forever.

use crate::cache::snapshot::SnapshotHolder;
use crate::cache::SnapshotSource;
use crate::error::GridError;
use crate::metrics::SharedMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fetch from the source and, on success, publish into the holder.
///
/// The publish ticket is taken before the fetch starts, so when fetches
/// overlap the one that started last wins regardless of finish order.
pub(crate) async fn fetch_and_publish<T, S>(
    source: &S,
    holder: &SnapshotHolder<T>,
    metrics: Option<&SharedMetrics>,
    trigger: &'static str,
) -> Result<Arc<T>, GridError>
where
    S: SnapshotSource<T>,
{
    let ticket = holder.ticket();
    let start = Instant::now();
    let result = source.fetch().await;
    let elapsed = start.elapsed();

    if let Some(metrics) = metrics {
        metrics.record_fetch(trigger, result.is_ok(), elapsed.as_secs_f64());
    }

    let snapshot = holder.publish(ticket, result?).await;

    debug!(
        source = source.name(),
        trigger,
        elapsed_ms = elapsed.as_millis() as u64,
        "Published new snapshot"
    );

    if let Some(metrics) = metrics {
        metrics.set_generation(holder.generation().await);
    }

    Ok(snapshot)
}

pub(crate) struct Refresher<T, S> {
    pub holder: SnapshotHolder<T>,
    pub source: Arc<S>,
    pub ttl: Duration,
    pub failure_alert_threshold: u32,
    pub shutdown: CancellationToken,
    pub metrics: Option<SharedMetrics>,
}

impl<T, S> Refresher<T, S>
where
    T: Send + Sync + 'static,
    S: SnapshotSource<T>,
{
    /// Run the refresh loop until the shutdown token is cancelled
    pub async fn run(self) {
        info!(
            source = self.source.name(),
            ttl_ms = self.ttl.as_millis() as u64,
            "Starting background refresher"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                outcome = fetch_and_publish(
                    self.source.as_ref(),
                    &self.holder,
                    self.metrics.as_ref(),
                    "refresh",
                ) => outcome,
            };

            match outcome {
                Ok(_) => {
                    if consecutive_failures > 0 {
                        info!(
                            failures = consecutive_failures,
                            "Refresh recovered after failures"
                        );
                    }
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures >= self.failure_alert_threshold {
                        error!(
                            source = self.source.name(),
                            failures = consecutive_failures,
                            error = %e,
                            "Snapshot refresh keeps failing, serving stale data"
                        );
                    } else {
                        warn!(
                            source = self.source.name(),
                            failures = consecutive_failures,
                            error = %e,
                            "Snapshot refresh failed, retrying next cycle"
                        );
                    }
                }
            }

            if let Some(metrics) = &self.metrics {
                metrics.set_consecutive_failures(consecutive_failures);
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.ttl) => {}
            }
        }

        info!(source = self.source.name(), "Background refresher stopped");
    }
}
