use std::{path::PathBuf, time::Duration};

/// Runtime knobs for the process supervisor and its health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Java executable used for direct jar launches.
    pub runtime: PathBuf,
    pub health_interval: Duration,
    pub probe_timeout: Duration,
    /// How long a stopped server may take to exit before it is killed.
    pub stop_grace: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            runtime: PathBuf::from("java"),
            health_interval: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(2),
            stop_grace: Duration::from_secs(10),
        }
    }
}

impl SupervisorSettings {
    pub fn with_runtime<P: Into<PathBuf>>(mut self, runtime: P) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }
}
