use crate::command::run_command;
use crate::error::GridError;
use std::time::Duration;
use tracing::info;

/// Job deletion through the qdel binary.
///
/// In dry-run mode nothing is executed and every call succeeds, which keeps
/// the delete path usable alongside generated snapshot data.
#[derive(Debug, Clone)]
pub struct Qdel {
    binary: String,
    timeout: Duration,
    dry_run: bool,
}

impl Qdel {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Delete one or more jobs by id (`qdel 1,2,3`). Returns qdel's output.
    pub async fn delete_jobs_by_id(&self, ids: &[String]) -> Result<String, GridError> {
        let targets = join_targets(ids, "job id")?;
        info!(ids = %targets, "Deleting jobs by id");
        self.run(vec![targets]).await
    }

    /// Delete every job owned by the given users (`qdel -u alice,bob`)
    pub async fn delete_jobs_by_owner(&self, owners: &[String]) -> Result<String, GridError> {
        let targets = join_targets(owners, "owner")?;
        info!(owners = %targets, "Deleting jobs by owner");
        self.run(vec!["-u".to_string(), targets]).await
    }

    async fn run(&self, args: Vec<String>) -> Result<String, GridError> {
        if self.dry_run {
            info!(args = ?args, "Dry run, qdel not executed");
            return Ok(String::new());
        }

        run_command(&self.binary, &args, self.timeout).await
    }
}

fn join_targets(targets: &[String], what: &str) -> Result<String, GridError> {
    let targets: Vec<&str> = targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if targets.is_empty() {
        return Err(GridError::InvalidFilter(format!("at least one {} is required", what)));
    }

    Ok(targets.join(","))
}
