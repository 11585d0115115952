//! Cache module for gridstat.
//!
//! This module provides the refresh cache that serves the latest scheduler
//! snapshot to concurrent readers:
//! - A single snapshot slot, replaced whole on every publish
//! - A background refresher re-fetching on a fixed interval
//! - Serialized read and forced-update workers
//! - Supervised shutdown that joins every worker

mod accessor;
pub mod manager;
mod refresher;
pub mod snapshot;

pub use manager::{CacheConfig, SnapshotCache};
pub use snapshot::SnapshotHolder;

use crate::error::GridError;
use std::future::Future;

/// Where snapshots come from.
///
/// A fetch may be slow (an external process) and may fail; the cache treats
/// every failure the same way. Dropping the returned future must abandon the
/// fetch, which is how shutdown interrupts a fetch in flight.
pub trait SnapshotSource<T>: Send + Sync + 'static {
    /// Label used in logs
    fn name(&self) -> &'static str;

    fn fetch(&self) -> impl Future<Output = Result<T, GridError>> + Send;
}
