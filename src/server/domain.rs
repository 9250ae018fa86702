use std::path::{Path, PathBuf};

use tokio::{
    fs::{self, read, read_dir},
    sync::{Mutex, mpsc, watch},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    config::{InstanceEvent, SupervisorSettings},
    error::{CreationError, ServerError},
    instance::{CommandChannel, LifecycleState, ProcessSupervisor, ServerInstance},
    provision::{ProvisionEvent, ProvisionRequest, Provisioner, ProvisioningJob},
};

/// Directory inside each server root holding our own bookkeeping.
pub const INTERNAL_DIR: &str = ".minehost";
pub const DESCRIPTOR_FILE: &str = "instance.json";

/// A provisioned server: its supervisor plus an operator console.
#[derive(Debug)]
pub struct MineHostServer {
    supervisor: ProcessSupervisor,
    console: Mutex<CommandChannel>,
}

impl MineHostServer {
    pub fn new(instance: ServerInstance, settings: SupervisorSettings) -> Self {
        let supervisor = ProcessSupervisor::new(instance, settings);
        let console = Mutex::new(CommandChannel::new(supervisor.clone()));
        Self {
            supervisor,
            console,
        }
    }

    /// Provisions a new server and persists its descriptor next to it.
    pub async fn create(
        provisioner: &Provisioner,
        request: ProvisionRequest,
        settings: SupervisorSettings,
        events: Option<mpsc::UnboundedSender<ProvisionEvent>>,
    ) -> Result<Self, CreationError> {
        let mut job = ProvisioningJob::new(&request);
        if let Some(events) = events {
            job = job.with_events(events);
        }

        let instance = provisioner.provision(&request, &mut job).await?;
        write_descriptor(&instance).await?;

        Ok(Self::new(instance, settings))
    }

    pub async fn load(path: &Path, settings: SupervisorSettings) -> Result<Self, CreationError> {
        let descriptor = path.join(INTERNAL_DIR).join(DESCRIPTOR_FILE);

        let data = read(&descriptor)
            .await
            .map_err(|_| CreationError::DirectoryError(path.to_path_buf()))?;

        let mut instance: ServerInstance = serde_json::from_slice(&data)
            .map_err(|e| CreationError::DescriptorError(e.to_string()))?;
        instance.root_dir = path.to_path_buf();

        Ok(Self::new(instance, settings))
    }

    /// Loads every server directory under `path`, skipping directories that
    /// hold no descriptor.
    pub async fn load_all(path: &Path, settings: SupervisorSettings) -> Result<Vec<Self>, CreationError> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut entries = read_dir(path)
            .await
            .map_err(|_| CreationError::DirectoryError(path.to_path_buf()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|_| CreationError::DirectoryError(path.to_path_buf()))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|_| CreationError::DirectoryError(entry.path()))?;
            if meta.is_dir() && entry.path().join(INTERNAL_DIR).join(DESCRIPTOR_FILE).is_file() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut servers = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match Self::load(&dir, settings.clone()).await {
                Ok(server) => servers.push(server),
                Err(e) => warn!(dir = %dir.display(), "skipping server: {e}"),
            }
        }

        Ok(servers)
    }

    pub fn instance(&self) -> &ServerInstance {
        self.supervisor.instance()
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn state(&self) -> LifecycleState {
        self.supervisor.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.supervisor.watch_state()
    }

    pub fn subscribe(&self) -> BroadcastStream<InstanceEvent> {
        self.supervisor.subscribe()
    }

    pub async fn start(&self) -> Result<(), ServerError> {
        self.supervisor.start().await
    }

    pub async fn stop(&self) {
        self.supervisor.stop().await
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await
    }

    pub async fn kill(&self) -> Result<(), ServerError> {
        self.supervisor.kill().await
    }

    pub async fn send_command(&self, line: &str) -> Result<(), ServerError> {
        self.console.lock().await.send(line).await
    }

    pub async fn recall_previous(&self) -> Option<String> {
        self.console.lock().await.recall_previous().map(str::to_string)
    }

    pub async fn recall_next(&self) -> Option<String> {
        self.console.lock().await.recall_next().map(str::to_string)
    }

    /// Rewrites the persisted descriptor from the live instance.
    pub async fn write_config(&self) -> Result<(), ServerError> {
        write_descriptor(self.instance())
            .await
            .map_err(|_| ServerError::FileIO)
    }
}

async fn write_descriptor(instance: &ServerInstance) -> Result<(), CreationError> {
    let dir = instance.root_dir.join(INTERNAL_DIR);
    fs::create_dir_all(&dir)
        .await
        .map_err(|_| CreationError::DirectoryError(dir.clone()))?;

    let json = serde_json::to_vec_pretty(instance)
        .map_err(|e| CreationError::DescriptorError(e.to_string()))?;
    let path = dir.join(DESCRIPTOR_FILE);
    fs::write(&path, json)
        .await
        .map_err(|_| CreationError::DirectoryError(path.clone()))?;

    info!(path = %path.display(), "instance descriptor written");
    Ok(())
}
