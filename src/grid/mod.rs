//! Grid engine data model.
//!
//! Typed representation of `qstat -F -xml` output plus the filter predicates
//! that operate on job lists.

pub mod filters;
pub mod host;
pub mod job;
pub mod jobinfo;
pub mod resource;

pub use host::{Host, PendingJobs, QueueInfo};
pub use job::{filter_jobs, Job, JobList, Task};
pub use jobinfo::JobInfo;
pub use resource::{Resource, ResourceList, StorageValue};
