use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;
use tracing::{debug, info};

use crate::{error::InstallError, utils::tail_chars};

/// How much installer output an `InstallError` carries.
pub const ERROR_TAIL_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub code: Option<i32>,
    /// Captured stdout followed by stderr.
    pub output: String,
}

/// Runs a mod-loader installer jar in server mode.
#[derive(Debug, Clone)]
pub struct Installer {
    runtime: PathBuf,
}

impl Installer {
    pub fn new<P: Into<PathBuf>>(runtime: P) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    /// Runs `<runtime> -jar <installer> --installServer` inside `work_dir`
    /// and waits for it. The installer writes the server files itself.
    pub async fn install(&self, installer_jar: &Path, work_dir: &Path) -> Result<InstallResult, InstallError> {
        let jar = installer_jar
            .strip_prefix(work_dir)
            .unwrap_or(installer_jar);
        info!(installer = %jar.display(), "running installer");

        let output = Command::new(&self.runtime)
            .arg("-jar")
            .arg(jar)
            .arg("--installServer")
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    InstallError::RuntimeNotFound(self.runtime.display().to_string())
                }
                _ => InstallError::Spawn(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code();
        debug!(?code, "installer finished");

        if !output.status.success() {
            let diagnostics = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(InstallError::Failed {
                code,
                tail: tail_chars(diagnostics, ERROR_TAIL_CHARS).to_string(),
            });
        }

        Ok(InstallResult {
            code,
            output: format!("{stdout}{stderr}"),
        })
    }
}
