//! The single snapshot slot shared by the cache workers.
//!
//! Readers clone an `Arc` out of the slot and are never blocked by an
//! in-flight refresh; writers replace the whole snapshot at once.
//!
//! Writers take a ticket before fetching and publish with it. A publish whose
//! ticket is older than the one already in the slot is discarded, so a slow
//! fetch can never replace data fetched after it started.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::debug;

struct Slot<T> {
    snapshot: Arc<T>,
    generation: u64,
    ticket: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Thread-safe holder for the current snapshot with atomic swap
pub struct SnapshotHolder<T> {
    current: Arc<RwLock<Slot<T>>>,
    published: Arc<watch::Sender<u64>>,
    tickets: Arc<AtomicU64>,
}

impl<T> Clone for SnapshotHolder<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            published: self.published.clone(),
            tickets: self.tickets.clone(),
        }
    }
}

impl<T: Default> Default for SnapshotHolder<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Default> SnapshotHolder<T> {
    /// Holder with an empty (default) snapshot and generation 0
    pub fn empty() -> Self {
        let (published, _) = watch::channel(0);
        Self {
            current: Arc::new(RwLock::new(Slot {
                snapshot: Arc::new(T::default()),
                generation: 0,
                ticket: 0,
                refreshed_at: None,
            })),
            published: Arc::new(published),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> SnapshotHolder<T> {
    /// Get the current snapshot
    pub async fn get(&self) -> Arc<T> {
        self.current.read().await.snapshot.clone()
    }

    /// Reserve a publish ticket. Take it before fetching the data that will
    /// be published with it.
    pub fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish a snapshot fetched under `ticket`, returning whatever the slot
    /// holds afterwards. When a newer ticket has already been published the
    /// snapshot is dropped and the newer one is returned.
    pub async fn publish(&self, ticket: u64, snapshot: T) -> Arc<T> {
        let (current, generation) = {
            let mut guard = self.current.write().await;
            if ticket < guard.ticket {
                debug!(
                    ticket,
                    current_ticket = guard.ticket,
                    "Discarding snapshot older than the published one"
                );
                return guard.snapshot.clone();
            }

            guard.snapshot = Arc::new(snapshot);
            guard.generation += 1;
            guard.ticket = ticket;
            guard.refreshed_at = Some(Utc::now());
            (guard.snapshot.clone(), guard.generation)
        };
        debug!(generation, ticket, "Swapped snapshot");
        self.published.send_replace(generation);
        current
    }

    /// Atomically swap to a new snapshot, returning it
    pub async fn swap(&self, snapshot: T) -> Arc<T> {
        let ticket = self.ticket();
        self.publish(ticket, snapshot).await
    }

    /// Number of snapshots published so far
    pub async fn generation(&self) -> u64 {
        self.current.read().await.generation
    }

    /// Wall-clock time of the last publish
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.refreshed_at
    }

    /// Wait until at least `generation` snapshots have been published.
    /// Returns false if the wait timed out.
    pub async fn wait_for_generation(&self, generation: u64, timeout: Duration) -> bool {
        let mut rx = self.published.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|g| *g >= generation)).await,
            Ok(Ok(_))
        );
        reached
    }
}
