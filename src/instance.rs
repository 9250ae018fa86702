mod command;
mod handle;
mod health;
pub mod launch;
mod types;

pub use command::{CommandChannel, CommandHistory};
pub use handle::ProcessSupervisor;
pub use health::HealthMonitor;
pub use launch::Launch;
pub use types::{LifecycleState, ServerInstance};
