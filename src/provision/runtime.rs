use std::{io, path::Path, process::Stdio};

use tokio::process::Command;
use tracing::debug;

use crate::error::ProvisionError;

/// Runs `<runtime> -version` and returns the first line it prints.
///
/// Java writes its version banner to stderr; stdout is used as a fallback
/// for runtimes that do not.
pub async fn probe_runtime(runtime: &Path) -> Result<String, ProvisionError> {
    let output = Command::new(runtime)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ProvisionError::RuntimeNotFound(runtime.display().to_string()),
            _ => ProvisionError::Io(e),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let banner = stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();
    debug!(runtime = %runtime.display(), %banner, "runtime found");
    Ok(banner)
}
