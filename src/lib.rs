//! Provisioning and supervision of a locally hosted Minecraft server.
//!
//! [`provision`] resolves, downloads, installs and configures a server
//! directory; [`instance`] runs it, probes its port and relays operator
//! commands; [`server`] ties both to a persisted descriptor.

pub mod config;
pub mod error;
#[cfg(all(feature = "core", feature = "events"))]
pub mod instance;
#[cfg(feature = "provision")]
pub mod provision;
#[cfg(feature = "provision")]
pub mod server;
#[cfg(feature = "events")]
pub mod utils;

pub use config::{ServerFields, SupervisorSettings, Variant};
#[cfg(all(feature = "core", feature = "events"))]
pub use instance::{CommandChannel, LifecycleState, ProcessSupervisor, ServerInstance};
#[cfg(feature = "provision")]
pub use server::MineHostServer;
