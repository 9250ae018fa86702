use std::{io, path::PathBuf};

use thiserror::Error;

use crate::config::Variant;

#[derive(Debug, Clone, Error)]
pub enum VersionError {
    #[error("Incorrect major version: {0}")]
    IncorrectMajor(String),

    #[error("Incorrect minor version: {0}")]
    IncorrectMinor(String),

    #[error("Incorrect patch version: {0}")]
    IncorrectPatch(String),

    #[error("Missing major version")]
    MissingMajor,

    #[error("Missing minor version")]
    MissingMinor,

    #[error("Too many components")]
    ExtraComponents,
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("{variant} {version} is not a supported version")]
    UnknownVersion { variant: Variant, version: String },

    #[error("Artifact registry is malformed: {0}")]
    Registry(String),
}

#[cfg(feature = "provision")]
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to write download: {0}")]
    Io(#[from] io::Error),
}

#[cfg(feature = "provision")]
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Runtime not found: {0}")]
    RuntimeNotFound(String),

    #[error("Failed to launch installer: {0}")]
    Spawn(#[source] io::Error),

    #[error("Installer exited with {code:?}:\n{tail}")]
    Failed { code: Option<i32>, tail: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(feature = "provision")]
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Runtime not found: {0}. Install Java 17+.")]
    RuntimeNotFound(String),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Installation failed: {0}")]
    Install(#[from] InstallError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Filesystem error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(feature = "provision")]
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("Invalid server directory: {}", .0.display())]
    DirectoryError(PathBuf),

    #[error("Failed to read instance descriptor: {0}")]
    DescriptorError(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error("Nothing to run in {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Runtime not found: {0}. Install Java 17+.")]
    RuntimeNotFound(String),

    #[error("Failed to spawn server: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to access child stdout pipe")]
    NoStdoutPipe,

    #[error("Failed to access child stdin pipe")]
    NoStdinPipe,

    #[error("Failed to access child stderr pipe")]
    NoStderrPipe,

    #[error("Error sending command: {0}")]
    CommandDelivery(#[source] io::Error),

    #[error("Failed to persist instance descriptor")]
    FileIO,
}
