use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::config::Variant;

/// Descriptor of a provisioned server. Identity is the root directory; the
/// live lifecycle state is owned by the supervisor that runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstance {
    pub root_dir: PathBuf,
    pub port: u16,
    pub variant: Variant,
    pub version: String,
    pub ram_gb: u32,
    /// Server jar relative to `root_dir`, when the variant produces one.
    pub jar_path: Option<PathBuf>,
    /// Resolved run command for this platform.
    pub launch: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Offline,
    Starting,
    Online,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Offline => write!(f, "Offline"),
            LifecycleState::Starting => write!(f, "Starting..."),
            LifecycleState::Online => write!(f, "Online"),
        }
    }
}
