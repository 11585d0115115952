//! Public façade over the cache workers.

use crate::cache::accessor::{AccessMode, Accessor, Reply};
use crate::cache::refresher::Refresher;
use crate::cache::snapshot::SnapshotHolder;
use crate::cache::SnapshotSource;
use crate::error::GridError;
use crate::metrics::SharedMetrics;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Requests that can queue up per worker before senders wait
const REQUEST_QUEUE_DEPTH: usize = 32;

/// Configuration for the snapshot cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Interval between background refreshes
    pub ttl: Duration,
    /// Upper bound on how long `get`/`update` wait for an answer
    pub request_timeout: Duration,
    /// Consecutive refresh failures before logging escalates to error
    pub failure_alert_threshold: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            request_timeout: Duration::from_secs(3),
            failure_alert_threshold: 5,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }
}

/// A periodically refreshed, single-snapshot cache.
///
/// `start` spawns three workers: a refresher that re-fetches every `ttl`,
/// a read worker answering [`get`](Self::get), and an update worker that
/// answers [`update`](Self::update) with a freshly fetched snapshot. Both
/// writers publish into the same [`SnapshotHolder`], so `get` after `update`
/// never goes backwards.
pub struct SnapshotCache<T> {
    holder: SnapshotHolder<T>,
    read_tx: mpsc::Sender<Reply<T>>,
    update_tx: mpsc::Sender<Reply<T>>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
    request_timeout: Duration,
    metrics: Option<SharedMetrics>,
}

impl<T> SnapshotCache<T>
where
    T: Default + Send + Sync + 'static,
{
    /// Start the cache workers. Must be called from within a Tokio runtime.
    ///
    /// The first refresh starts immediately but is not awaited, so an early
    /// `get` may return an empty snapshot; use
    /// [`wait_for_snapshot`](Self::wait_for_snapshot) to avoid that.
    pub fn start<S>(source: S, config: CacheConfig) -> Self
    where
        S: SnapshotSource<T>,
    {
        Self::spawn(source, config, None)
    }

    pub fn start_with_metrics<S>(source: S, config: CacheConfig, metrics: SharedMetrics) -> Self
    where
        S: SnapshotSource<T>,
    {
        Self::spawn(source, config, Some(metrics))
    }

    fn spawn<S>(source: S, config: CacheConfig, metrics: Option<SharedMetrics>) -> Self
    where
        S: SnapshotSource<T>,
    {
        let holder = SnapshotHolder::empty();
        let source = Arc::new(source);
        let shutdown = CancellationToken::new();

        let (read_tx, read_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (update_tx, update_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);

        info!(
            source = source.name(),
            ttl_ms = config.ttl.as_millis() as u64,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            "Starting snapshot cache"
        );

        let refresher = Refresher {
            holder: holder.clone(),
            source: source.clone(),
            ttl: config.ttl,
            failure_alert_threshold: config.failure_alert_threshold.max(1),
            shutdown: shutdown.clone(),
            metrics: metrics.clone(),
        };

        let reader: Accessor<T, S> = Accessor {
            name: "get",
            mode: AccessMode::ReadOnly,
            holder: holder.clone(),
            requests: read_rx,
            shutdown: shutdown.clone(),
            metrics: metrics.clone(),
        };

        let updater = Accessor {
            name: "update",
            mode: AccessMode::FetchAndReplace(source),
            holder: holder.clone(),
            requests: update_rx,
            shutdown: shutdown.clone(),
            metrics: metrics.clone(),
        };

        let workers = vec![
            tokio::spawn(refresher.run()),
            tokio::spawn(reader.run()),
            tokio::spawn(updater.run()),
        ];

        Self {
            holder,
            read_tx,
            update_tx,
            shutdown,
            workers: Mutex::new(workers),
            stopped: AtomicBool::new(false),
            request_timeout: config.request_timeout,
            metrics,
        }
    }

    /// The most recently published snapshot.
    pub async fn get(&self) -> Result<Arc<T>, GridError> {
        self.request("get", &self.read_tx).await
    }

    /// Force a fetch and return the result, publishing it for later `get`s.
    pub async fn update(&self) -> Result<Arc<T>, GridError> {
        self.request("update", &self.update_tx).await
    }

    /// Like `get`, but degrades to an empty snapshot on any failure
    pub async fn get_or_empty(&self) -> Arc<T> {
        match self.get().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Request to cache has failed");
                Arc::new(T::default())
            }
        }
    }

    async fn request(
        &self,
        operation: &'static str,
        tx: &mpsc::Sender<Reply<T>>,
    ) -> Result<Arc<T>, GridError> {
        if !self.is_active() {
            return Err(GridError::Stopped);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let exchange = async {
            tx.send(reply_tx).await.map_err(|_| GridError::Stopped)?;
            reply_rx.await.map_err(|_| GridError::Stopped)?
        };

        let result = match timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(GridError::Timeout(self.request_timeout)),
        };

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "success",
                Err(GridError::Timeout(_)) => "timeout",
                Err(GridError::Stopped) => "stopped",
                Err(_) => "error",
            };
            metrics.record_request(operation, outcome);
        }

        if let Err(e) = &result {
            warn!(operation, error = %e, "Cache request failed");
        }

        result
    }

    /// Wait for the first successful refresh. Returns false on timeout.
    pub async fn wait_for_snapshot(&self, wait: Duration) -> bool {
        self.holder.wait_for_generation(1, wait).await
    }

    /// Number of snapshots published since start
    pub async fn generation(&self) -> u64 {
        self.holder.generation().await
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.holder.refreshed_at().await
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    /// Cancel every worker and wait for all of them to exit.
    ///
    /// Any fetch in flight is abandoned. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        // Held until every worker has exited so concurrent callers wait too
        let mut workers = self.workers.lock().await;
        let handles = std::mem::take(&mut *workers);
        if handles.is_empty() {
            return;
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Cache worker panicked");
            }
        }

        self.stopped.store(true, Ordering::Release);
        info!("Snapshot cache stopped");
    }
}

impl<T> Drop for SnapshotCache<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
