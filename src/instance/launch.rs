//! Resolution of the command used to run a provisioned server.
//!
//! Scripts win over direct jar launches: an installer generated `run.sh`
//! first, then the `start.sh` written at provisioning time, and only then a
//! `java -jar` invocation built from the instance's RAM allocation.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::{
    config::{SupervisorSettings, Variant},
    error::ServerError,
};

use super::ServerInstance;

#[cfg(unix)]
pub const INSTALLER_SCRIPT: &str = "run.sh";
#[cfg(windows)]
pub const INSTALLER_SCRIPT: &str = "run.bat";

#[cfg(unix)]
pub const START_SCRIPT: &str = "start.sh";
#[cfg(windows)]
pub const START_SCRIPT: &str = "start.bat";

/// A program plus arguments, run from the instance root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Launch {
    pub fn script(name: &str) -> Self {
        #[cfg(unix)]
        let launch = Self {
            program: PathBuf::from("bash"),
            args: vec![name.to_string()],
        };
        #[cfg(windows)]
        let launch = Self {
            program: PathBuf::from("cmd"),
            args: vec!["/c".to_string(), name.to_string()],
        };
        launch
    }

    pub fn direct(runtime: &Path, ram_gb: u32, jar: &Path) -> Self {
        Self {
            program: runtime.to_path_buf(),
            args: vec![
                format!("-Xmx{ram_gb}G"),
                format!("-Xms{ram_gb}G"),
                "-jar".to_string(),
                jar.to_string_lossy().into_owned(),
                "--nogui".to_string(),
            ],
        }
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// The command as a single shell line, quoting arguments with spaces.
    pub fn render(&self) -> String {
        self.argv()
            .iter()
            .map(|arg| {
                if arg.contains(char::is_whitespace) {
                    format!("\"{arg}\"")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn command(&self, root: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::piped());

        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

/// Picks the server jar a direct launch would run.
pub fn find_server_jar(root: &Path, variant: Variant) -> Option<PathBuf> {
    let mut jars: Vec<String> = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".jar"))
        .filter(|name| match variant {
            Variant::Paper => name.starts_with("paper-"),
            Variant::Forge => name.starts_with("forge-") && !name.contains("installer"),
        })
        .collect();
    jars.sort();
    jars.into_iter().next().map(PathBuf::from)
}

/// Resolves how to run `instance`, failing before anything is spawned when
/// the directory holds nothing runnable or the runtime is missing.
pub fn resolve(instance: &ServerInstance, settings: &SupervisorSettings) -> Result<Launch, ServerError> {
    let root = &instance.root_dir;
    if !root.is_dir() {
        return Err(ServerError::MissingArtifact(root.clone()));
    }

    let launch = if root.join(INSTALLER_SCRIPT).is_file() {
        Launch::script(INSTALLER_SCRIPT)
    } else if root.join(START_SCRIPT).is_file() {
        Launch::script(START_SCRIPT)
    } else {
        let jar = instance
            .jar_path
            .clone()
            .filter(|jar| root.join(jar).is_file())
            .or_else(|| find_server_jar(root, instance.variant))
            .ok_or_else(|| ServerError::MissingArtifact(root.clone()))?;
        Launch::direct(&settings.runtime, instance.ram_gb, &jar)
    };

    which::which(&settings.runtime)
        .map_err(|_| ServerError::RuntimeNotFound(settings.runtime.display().to_string()))?;

    Ok(launch)
}
