use crate::cache::SnapshotSource;
use crate::command::run_command;
use crate::error::GridError;
use crate::grid::{JobInfo, JobList};
use std::time::Duration;
use tracing::debug;

/// Which jobs qstat should report.
///
/// `extra` holds additional switches passed through verbatim, each with an
/// optional value.
#[derive(Debug, Clone, Default)]
pub struct QstatRequest {
    pub user: Option<String>,
    pub state: Option<String>,
    pub queue: Option<String>,
    pub extra: Vec<(String, Option<String>)>,
}

impl QstatRequest {
    /// Build the argument list. Without a user every user's jobs are listed,
    /// and the full XML output switches always come last.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (flag, value) in &self.extra {
            args.push(flag.clone());
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                args.push(value.clone());
            }
        }

        args.push("-u".to_string());
        args.push(self.user.clone().unwrap_or_else(|| "*".to_string()));

        if let Some(state) = &self.state {
            args.push("-s".to_string());
            args.push(state.clone());
        }

        if let Some(queue) = &self.queue {
            args.push("-q".to_string());
            args.push(queue.clone());
        }

        args.push("-F".to_string());
        args.push("-xml".to_string());
        args
    }
}

/// Snapshot source backed by the qstat binary
#[derive(Debug, Clone)]
pub struct QstatSource {
    binary: String,
    timeout: Duration,
    request: QstatRequest,
}

impl QstatSource {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            request: QstatRequest::default(),
        }
    }

    pub fn with_request(mut self, request: QstatRequest) -> Self {
        self.request = request;
        self
    }

    /// Run qstat once and parse its output
    pub async fn job_info(&self) -> Result<JobInfo, GridError> {
        let xml = run_command(&self.binary, &self.request.arguments(), self.timeout).await?;
        let info = JobInfo::from_xml(&xml)?;
        debug!(
            hosts = info.hosts().len(),
            pending = info.pending().len(),
            "Parsed qstat output"
        );
        Ok(info)
    }

    /// Running then pending jobs from a single qstat run
    pub async fn jobs(&self) -> Result<JobList, GridError> {
        Ok(self.job_info().await?.jobs())
    }
}

impl SnapshotSource<JobInfo> for QstatSource {
    fn name(&self) -> &'static str {
        "qstat"
    }

    async fn fetch(&self) -> Result<JobInfo, GridError> {
        self.job_info().await
    }
}
