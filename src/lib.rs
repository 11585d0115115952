//! gridstat - Sun Grid Engine job status with a refreshing snapshot cache
//!
//! - Typed model of `qstat -F -xml` output with job filters
//! - qstat/qdel process plumbing plus a generated source for test mode
//! - A single-snapshot cache refreshed in the background
//! - Prometheus metrics and an axum HTTP surface

pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod server;

pub use cache::{CacheConfig, SnapshotCache, SnapshotSource};
pub use error::GridError;
pub use grid::{Host, Job, JobInfo, JobList};
