//! Serialized request/response worker.
//!
//! Requests arrive one at a time over an mpsc channel, each carrying the
//! oneshot sender the answer goes back on. The same loop backs both the
//! read worker (hand out the current snapshot) and the update worker
//! (fetch, publish, then hand out the fresh snapshot).

use crate::cache::refresher::fetch_and_publish;
use crate::cache::snapshot::SnapshotHolder;
use crate::cache::SnapshotSource;
use crate::error::GridError;
use crate::metrics::SharedMetrics;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) type Reply<T> = oneshot::Sender<Result<Arc<T>, GridError>>;

pub(crate) enum AccessMode<S> {
    ReadOnly,
    FetchAndReplace(Arc<S>),
}

pub(crate) struct Accessor<T, S> {
    pub name: &'static str,
    pub mode: AccessMode<S>,
    pub holder: SnapshotHolder<T>,
    pub requests: mpsc::Receiver<Reply<T>>,
    pub shutdown: CancellationToken,
    pub metrics: Option<SharedMetrics>,
}

impl<T, S> Accessor<T, S>
where
    T: Send + Sync + 'static,
    S: SnapshotSource<T>,
{
    /// Serve requests until cancelled or every sender is dropped
    pub async fn run(mut self) {
        info!(worker = self.name, "Starting cache worker");

        loop {
            let reply = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(reply) => reply,
                    None => break,
                },
            };

            // The requester may have timed out while this request was queued
            if reply.is_closed() {
                debug!(worker = self.name, "Skipping abandoned request");
                continue;
            }

            let result = match &self.mode {
                AccessMode::ReadOnly => Ok(self.holder.get().await),
                AccessMode::FetchAndReplace(source) => {
                    let fetched = tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => {
                            let _ = reply.send(Err(GridError::Stopped));
                            break;
                        }
                        fetched = fetch_and_publish(
                            source.as_ref(),
                            &self.holder,
                            self.metrics.as_ref(),
                            self.name,
                        ) => fetched,
                    };

                    if let Err(e) = &fetched {
                        warn!(
                            worker = self.name,
                            source = source.name(),
                            error = %e,
                            "On-demand fetch failed"
                        );
                    }
                    fetched
                }
            };

            if reply.send(result).is_err() {
                debug!(worker = self.name, "Requester went away before the reply");
            }
        }

        info!(worker = self.name, "Cache worker stopped");
    }
}
