//! External grid engine commands.
//!
//! qstat feeds the snapshot cache, qdel removes jobs, and a generated source
//! stands in for both when no grid engine is installed.

pub mod generated;
pub mod qdel;
pub mod qstat;

pub use generated::GeneratedSource;
pub use qdel::Qdel;
pub use qstat::{QstatRequest, QstatSource};

use crate::error::GridError;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Run `binary` with `args`, returning stdout.
///
/// The child inherits the environment and is killed if it outlives `limit`
/// or if the returned future is dropped.
pub async fn run_command(binary: &str, args: &[String], limit: Duration) -> Result<String, GridError> {
    debug!(binary, args = ?args, "Running command");
    let start = Instant::now();

    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(limit, command.output()).await {
        Err(_) => {
            warn!(binary, timeout_ms = limit.as_millis() as u64, "Command timed out");
            return Err(GridError::Timeout(limit));
        }
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            return Err(GridError::BinaryNotFound(binary.to_string()));
        }
        Ok(Err(e)) => return Err(e.into()),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(GridError::Command(format!(
            "{} exited with {}: {}",
            binary,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    debug!(
        binary,
        bytes = output.stdout.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Command finished"
    );

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
