use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{fs, sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

use crate::{
    config::{ServerFields, Variant},
    error::{InstallError, ProvisionError},
    instance::{
        Launch, ServerInstance,
        launch::{INSTALLER_SCRIPT, find_server_jar},
    },
    utils::tail_chars,
};

use super::{
    ArtifactDescriptor, ArtifactResolver, ConfigWriter, Downloader, ERROR_TAIL_CHARS, Installer,
    ProgressRange, ScriptCommand, probe_runtime,
};

const DIRECTORY_READY: u8 = 8;
const RUNTIME_READY: u8 = 15;
const PAPER_DOWNLOAD: (u8, u8) = (RUNTIME_READY, 80);
const FORGE_DOWNLOAD: (u8, u8) = (RUNTIME_READY, 65);
const INSTALLER_READY: u8 = 68;
const ARTIFACT_READY: u8 = 82;
const DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

impl Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    Progress(u8),
    Status(StatusLine),
}

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub variant: Variant,
    pub version: String,
    pub target_dir: PathBuf,
    pub fields: ServerFields,
    /// Replace `target_dir` if it already exists.
    pub overwrite: bool,
}

/// State of one provisioning run. Progress only moves forward.
#[derive(Debug)]
pub struct ProvisioningJob {
    variant: Variant,
    version: String,
    target_dir: PathBuf,
    progress: u8,
    log: Vec<StatusLine>,
    events: Option<mpsc::UnboundedSender<ProvisionEvent>>,
}

impl ProvisioningJob {
    pub fn new(request: &ProvisionRequest) -> Self {
        Self {
            variant: request.variant,
            version: request.version.clone(),
            target_dir: request.target_dir.clone(),
            progress: 0,
            log: Vec::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ProvisionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn log(&self) -> &[StatusLine] {
        &self.log
    }

    fn advance(&mut self, pct: u8) {
        let pct = pct.min(DONE);
        if pct <= self.progress {
            return;
        }
        self.progress = pct;
        self.emit(ProvisionEvent::Progress(pct));
    }

    fn status<S: Into<String>>(&mut self, level: StatusLevel, message: S) {
        let line = StatusLine {
            level,
            message: message.into(),
        };
        match level {
            StatusLevel::Error => error!("{}", line.message),
            _ => info!("{}", line.message),
        }
        self.log.push(line.clone());
        self.emit(ProvisionEvent::Status(line));
    }

    fn emit(&self, event: ProvisionEvent) {
        if let Some(events) = &self.events {
            _ = events.send(event);
        }
    }
}

/// Runs the provisioning pipeline.
#[derive(Debug, Clone)]
pub struct Provisioner {
    resolver: ArtifactResolver,
    downloader: Downloader,
    runtime: PathBuf,
}

impl Provisioner {
    pub fn new(resolver: ArtifactResolver) -> Self {
        Self {
            resolver,
            downloader: Downloader::new(),
            runtime: PathBuf::from("java"),
        }
    }

    pub fn with_runtime<P: Into<PathBuf>>(mut self, runtime: P) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    /// Runs the pipeline on a background task, streaming progress and status
    /// lines to the returned receiver.
    pub fn spawn(
        self: Arc<Self>,
        request: ProvisionRequest,
    ) -> (
        JoinHandle<Result<ServerInstance, ProvisionError>>,
        mpsc::UnboundedReceiver<ProvisionEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut job = ProvisioningJob::new(&request).with_events(tx);
            self.provision(&request, &mut job).await
        });
        (handle, rx)
    }

    pub async fn provision(
        &self,
        request: &ProvisionRequest,
        job: &mut ProvisioningJob,
    ) -> Result<ServerInstance, ProvisionError> {
        match self.run(request, job).await {
            Ok(instance) => Ok(instance),
            Err(e) => {
                job.status(StatusLevel::Error, format!("Error: {e}"));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &ProvisionRequest,
        job: &mut ProvisioningJob,
    ) -> Result<ServerInstance, ProvisionError> {
        let fields = &request.fields;
        fields.validate()?;
        let descriptor = self.resolver.resolve(request.variant, &request.version)?;
        let root = request.target_dir.as_path();

        prepare_directory(root, request.overwrite).await?;
        job.status(StatusLevel::Ok, format!("Folder created: {}", root.display()));
        job.advance(DIRECTORY_READY);

        let banner = probe_runtime(&self.runtime).await?;
        job.status(StatusLevel::Info, format!("Java: {banner}"));
        job.advance(RUNTIME_READY);

        let (launch, jar_path) = match request.variant {
            Variant::Paper => self.provision_paper(&descriptor, root, fields, job).await?,
            Variant::Forge => self.provision_forge(&descriptor, root, fields, job).await?,
        };

        if !fields.operators.is_empty() {
            job.status(
                StatusLevel::Ok,
                format!("Operators: {}", fields.operators.join(", ")),
            );
        }

        job.advance(DONE);
        job.status(StatusLevel::Ok, "-- Server ready! --");

        Ok(ServerInstance {
            root_dir: root.to_path_buf(),
            port: fields.port,
            variant: request.variant,
            version: request.version.clone(),
            ram_gb: fields.ram_gb,
            jar_path,
            launch: launch.argv(),
        })
    }

    async fn provision_paper(
        &self,
        descriptor: &ArtifactDescriptor,
        root: &Path,
        fields: &ServerFields,
        job: &mut ProvisioningJob,
    ) -> Result<(Launch, Option<PathBuf>), ProvisionError> {
        job.status(
            StatusLevel::Info,
            format!("Downloading PaperMC {}...", descriptor.version),
        );
        let (start, end) = PAPER_DOWNLOAD;
        self.downloader
            .download(descriptor, root, ProgressRange::new(start, end), |pct| {
                job.advance(pct)
            })
            .await?;
        job.status(StatusLevel::Ok, "Download complete.");
        job.advance(ARTIFACT_READY);

        write_config(root, fields, job).await?;

        let jar = PathBuf::from(&descriptor.file_name);
        let launch = Launch::direct(&self.runtime, fields.ram_gb, &jar);
        ConfigWriter::write_scripts(root, &ScriptCommand::same(launch.render())).await?;
        job.status(StatusLevel::Ok, "Start scripts created");

        Ok((launch, Some(jar)))
    }

    async fn provision_forge(
        &self,
        descriptor: &ArtifactDescriptor,
        root: &Path,
        fields: &ServerFields,
        job: &mut ProvisioningJob,
    ) -> Result<(Launch, Option<PathBuf>), ProvisionError> {
        let loader = descriptor
            .installer_version
            .as_deref()
            .unwrap_or(descriptor.version.as_str());
        job.status(
            StatusLevel::Info,
            format!("Downloading Forge {loader} installer..."),
        );
        let (start, end) = FORGE_DOWNLOAD;
        let installer_jar = self
            .downloader
            .download(descriptor, root, ProgressRange::new(start, end), |pct| {
                job.advance(pct)
            })
            .await?;
        job.status(StatusLevel::Ok, "Installer downloaded.");
        job.advance(INSTALLER_READY);

        job.status(StatusLevel::Info, "Installing Forge (may take a while)...");
        let result = Installer::new(&self.runtime)
            .install(&installer_jar, root)
            .await
            .map_err(|e| match e {
                InstallError::RuntimeNotFound(runtime) => ProvisionError::RuntimeNotFound(runtime),
                other => ProvisionError::Install(other),
            })?;
        debug!(
            code = ?result.code,
            output = tail_chars(&result.output, ERROR_TAIL_CHARS),
            "installer output"
        );
        if let Some(last) = result.output.lines().map(str::trim).rfind(|l| !l.is_empty()) {
            job.status(StatusLevel::Info, format!("Installer: {last}"));
        }
        job.status(StatusLevel::Ok, "Forge installed.");
        job.advance(ARTIFACT_READY);

        write_config(root, fields, job).await?;
        copy_mods(root, &fields.mods, job).await?;

        // Newer installers generate a run script; older ones a server jar.
        let (launch, jar, script) = match find_server_jar(root, descriptor.variant) {
            Some(jar) => {
                let launch = Launch::direct(&self.runtime, fields.ram_gb, &jar);
                let script = ScriptCommand::same(launch.render());
                (launch, Some(jar), script)
            }
            None => (
                Launch::script(INSTALLER_SCRIPT),
                None,
                ScriptCommand {
                    posix: "bash run.sh".to_string(),
                    windows: "call run.bat".to_string(),
                },
            ),
        };
        ConfigWriter::write_scripts(root, &script).await?;
        job.status(StatusLevel::Ok, "Start scripts created");

        Ok((launch, jar))
    }
}

async fn prepare_directory(root: &Path, overwrite: bool) -> Result<(), ProvisionError> {
    if fs::try_exists(root).await? {
        if !overwrite {
            return Err(ProvisionError::DirectoryExists(root.to_path_buf()));
        }
        fs::remove_dir_all(root).await?;
    }
    fs::create_dir_all(root).await?;
    Ok(())
}

async fn write_config(
    root: &Path,
    fields: &ServerFields,
    job: &mut ProvisioningJob,
) -> Result<(), ProvisionError> {
    ConfigWriter::write_config(root, fields).await?;
    job.status(StatusLevel::Ok, "eula.txt accepted");
    job.status(StatusLevel::Ok, "server.properties created");
    Ok(())
}

async fn copy_mods(
    root: &Path,
    mods: &[PathBuf],
    job: &mut ProvisioningJob,
) -> Result<(), ProvisionError> {
    let mods_dir = root.join("mods");
    fs::create_dir_all(&mods_dir).await?;
    job.status(StatusLevel::Ok, "mods/ folder created.");
    if mods.is_empty() {
        return Ok(());
    }

    job.status(StatusLevel::Info, format!("Copying {} mod(s)...", mods.len()));
    for source in mods {
        let Some(name) = source.file_name() else {
            continue;
        };
        fs::copy(source, mods_dir.join(name)).await?;
        job.status(StatusLevel::Ok, format!("  OK {}", name.to_string_lossy()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProvisionRequest {
        ProvisionRequest {
            variant: Variant::Paper,
            version: "1.20.1".into(),
            target_dir: PathBuf::from("server"),
            fields: ServerFields::default(),
            overwrite: false,
        }
    }

    #[test]
    fn progress_never_regresses() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut job = ProvisioningJob::new(&request()).with_events(tx);
        job.advance(15);
        job.advance(10);
        job.advance(15);
        job.advance(40);
        job.advance(250);
        assert_eq!(job.progress(), 100);

        let mut seen = Vec::new();
        while let Ok(ProvisionEvent::Progress(pct)) = rx.try_recv() {
            seen.push(pct);
        }
        assert_eq!(seen, [15, 40, 100]);
    }

    #[test]
    fn status_lines_are_kept_in_order() {
        let mut job = ProvisioningJob::new(&request());
        job.status(StatusLevel::Info, "one");
        job.status(StatusLevel::Error, "two");
        let messages: Vec<&str> = job.log().iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["one", "two"]);
    }

    #[tokio::test]
    async fn unknown_version_fails_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("server");
        let provisioner = Provisioner::new(ArtifactResolver::embedded().unwrap());
        let request = ProvisionRequest {
            version: "0.0.1".into(),
            target_dir: target.clone(),
            ..request()
        };
        let mut job = ProvisioningJob::new(&request);
        let result = provisioner.provision(&request, &mut job).await;
        assert!(matches!(result, Err(ProvisionError::Resolve(_))));
        assert!(!target.exists());
        assert_eq!(job.log().last().map(|l| l.level), Some(StatusLevel::Error));
    }

    #[tokio::test]
    async fn existing_directory_is_refused_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Provisioner::new(ArtifactResolver::embedded().unwrap());
        let request = ProvisionRequest {
            target_dir: dir.path().to_path_buf(),
            ..request()
        };
        let mut job = ProvisioningJob::new(&request);
        let result = provisioner.provision(&request, &mut job).await;
        assert!(matches!(result, Err(ProvisionError::DirectoryExists(_))));
    }
}
