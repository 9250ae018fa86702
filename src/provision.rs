//! Turns an operator's choices into a runnable server directory.
//!
//! The pipeline is strictly sequential: resolve, prepare the directory,
//! check the runtime, download, install (Forge only), then write config.
//! A failure aborts the remaining stages and leaves files already written
//! on disk; nothing is rolled back.

mod download;
mod install;
mod job;
mod registry;
mod runtime;
pub mod writer;

pub use download::{Downloader, ProgressRange};
pub use install::{ERROR_TAIL_CHARS, InstallResult, Installer};
pub use job::{ProvisionEvent, ProvisionRequest, Provisioner, ProvisioningJob, StatusLevel, StatusLine};
pub use registry::{ArtifactDescriptor, ArtifactResolver};
pub use runtime::probe_runtime;
pub use writer::{ConfigWriter, ScriptCommand};
