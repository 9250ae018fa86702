use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin},
    sync::{Mutex, broadcast, mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    config::{InstanceEvent, StreamLine, SupervisorSettings},
    error::ServerError,
};

use super::{HealthMonitor, LifecycleState, ServerInstance, launch};

/// The live child process. Only the supervisor creates or discards it.
#[derive(Debug)]
struct ProcessHandle {
    run: u64,
    child: Child,
    stdin: ChildStdin,
    /// Cancelled when this run ends; stops its health monitor.
    token: CancellationToken,
}

#[derive(Debug)]
struct Shared {
    instance: ServerInstance,
    settings: SupervisorSettings,
    state_tx: watch::Sender<LifecycleState>,
    events_tx: broadcast::Sender<InstanceEvent>,
    handle: Mutex<Option<ProcessHandle>>,
    runs: AtomicU64,
}

/// Owns the lifecycle of one server process.
///
/// Clones share the same process; every mutation of the process handle and
/// every state transition happens under the handle lock, so once `stop`
/// returns no stale output pump or health tick can change the state.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
}

impl ProcessSupervisor {
    pub fn new(instance: ServerInstance, settings: SupervisorSettings) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Offline);
        Self {
            shared: Arc::new(Shared {
                instance,
                settings,
                state_tx,
                events_tx: broadcast::Sender::new(2048),
                handle: Mutex::new(None),
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn instance(&self) -> &ServerInstance {
        &self.shared.instance
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.shared.settings
    }

    pub fn state(&self) -> LifecycleState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> BroadcastStream<InstanceEvent> {
        BroadcastStream::new(self.shared.events_tx.subscribe())
    }

    pub async fn is_running(&self) -> bool {
        self.shared.handle.lock().await.is_some()
    }

    pub async fn start(&self) -> Result<(), ServerError> {
        let mut guard = self.shared.handle.lock().await;
        if guard.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let instance = &self.shared.instance;
        let launch = launch::resolve(instance, &self.shared.settings)?;
        info!(
            root = %instance.root_dir.display(),
            command = %launch.render(),
            "starting server"
        );

        let mut child = launch
            .command(&instance.root_dir)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    ServerError::RuntimeNotFound(launch.program.display().to_string())
                }
                _ => ServerError::Spawn(e),
            })?;

        let stdout = child.stdout.take().ok_or(ServerError::NoStdoutPipe)?;
        let stderr = child.stderr.take().ok_or(ServerError::NoStderrPipe)?;
        let stdin = child.stdin.take().ok_or(ServerError::NoStdinPipe)?;

        let run = self.shared.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        *guard = Some(ProcessHandle {
            run,
            child,
            stdin,
            token: token.clone(),
        });
        self.transition(LifecycleState::Starting);
        self.notify("Starting server...");
        drop(guard);

        self.setup_stream_pumps(run, stdout, stderr);

        let monitor = HealthMonitor::new(
            instance.port,
            self.shared.settings.health_interval,
            self.shared.settings.probe_timeout,
        );
        tokio::spawn(monitor.run(self.clone(), run, token));

        Ok(())
    }

    /// Asks the server to stop, then terminates it. A no-op when nothing runs.
    ///
    /// Returns once the state is Offline; the process may still be saving.
    /// Use [`shutdown`](Self::shutdown) to wait for it to exit.
    pub async fn stop(&self) {
        _ = self.begin_stop().await;
    }

    /// Stops the server and waits for its process to exit, killing it once
    /// `stop_grace` has passed.
    pub async fn shutdown(&self) {
        if let Some(reaper) = self.begin_stop().await {
            if let Err(e) = reaper.await {
                warn!("reaper task failed: {e}");
            }
        }
    }

    async fn begin_stop(&self) -> Option<JoinHandle<()>> {
        let mut guard = self.shared.handle.lock().await;
        let mut handle = guard.take()?;
        handle.token.cancel();

        info!("stopping server");
        let write_timeout = self.shared.settings.probe_timeout;
        match timeout(write_timeout, write_line(&mut handle.stdin, "stop")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("could not deliver stop command: {e}"),
            Err(_) => debug!("stop command not accepted within {write_timeout:?}"),
        }
        terminate(&mut handle.child, false);

        self.transition(LifecycleState::Offline);
        drop(guard);
        self.notify("Server stopped.");

        let grace = self.shared.settings.stop_grace;
        let mut child = handle.child;
        Some(tokio::spawn(async move {
            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "server process exited"),
                Ok(Err(e)) => warn!("failed to reap server process: {e}"),
                Err(_) => {
                    warn!("server ignored termination for {grace:?}, killing it");
                    terminate(&mut child, true);
                    _ = child.wait().await;
                }
            }
        }))
    }

    /// Kills the server without asking it to save first.
    pub async fn kill(&self) -> Result<(), ServerError> {
        let mut guard = self.shared.handle.lock().await;
        let mut handle = guard.take().ok_or(ServerError::NotRunning)?;
        handle.token.cancel();

        warn!("killing server");
        terminate(&mut handle.child, true);
        _ = handle.child.wait().await;

        self.transition(LifecycleState::Offline);
        drop(guard);
        self.notify("Server killed.");
        Ok(())
    }

    /// Writes one line to the server's stdin.
    pub async fn write_line(&self, line: &str) -> Result<(), ServerError> {
        let mut guard = self.shared.handle.lock().await;
        let handle = guard.as_mut().ok_or(ServerError::NotRunning)?;
        let write_timeout = self.shared.settings.probe_timeout;
        timeout(write_timeout, write_line(&mut handle.stdin, line))
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "server is not reading its input",
                ))
            })
            .map_err(ServerError::CommandDelivery)
    }

    /// Applies a probe result for `run`. Returns whether polling should go on.
    pub(crate) async fn report_health(
        &self,
        run: u64,
        token: &CancellationToken,
        reachable: bool,
    ) -> bool {
        let guard = self.shared.handle.lock().await;
        if token.is_cancelled() {
            return false;
        }
        match guard.as_ref() {
            Some(handle) if handle.run == run => {
                self.transition(if reachable {
                    LifecycleState::Online
                } else {
                    LifecycleState::Starting
                });
                true
            }
            _ => {
                self.transition(LifecycleState::Offline);
                false
            }
        }
    }

    fn setup_stream_pumps(
        &self,
        run: u64,
        stdout: impl AsyncRead + Unpin + Send + 'static,
        stderr: impl AsyncRead + Unpin + Send + 'static,
    ) {
        let (line_tx, mut line_rx) = mpsc::channel::<StreamLine>(1024);

        tokio::spawn(pump(stdout, line_tx.clone(), StreamLine::stdout::<String>));
        tokio::spawn(pump(stderr, line_tx, StreamLine::stderr::<String>));

        let supervisor = self.clone();
        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                trace!(source = ?line.source, "{}", line.msg());
                _ = supervisor.shared.events_tx.send(InstanceEvent::output(line));
            }
            supervisor.observe_exit(run).await;
        });
    }

    /// Both output streams closed: the process is gone.
    async fn observe_exit(&self, run: u64) {
        let mut guard = self.shared.handle.lock().await;
        let Some(mut handle) = guard.take_if(|handle| handle.run == run) else {
            return;
        };
        handle.token.cancel();
        self.transition(LifecycleState::Offline);
        drop(guard);

        match handle.child.wait().await {
            Ok(status) => info!(%status, "server process exited"),
            Err(e) => warn!("failed to reap server process: {e}"),
        }
        self.notify("Server process exited.");
    }

    fn transition(&self, new: LifecycleState) {
        let mut old = new;
        let changed = self.shared.state_tx.send_if_modified(|state| {
            old = *state;
            if *state == new {
                return false;
            }
            *state = new;
            true
        });
        if changed {
            debug!(%old, %new, "state transition");
            _ = self
                .shared
                .events_tx
                .send(InstanceEvent::state_change(old, new));
        }
    }

    fn notify(&self, message: &str) {
        _ = self.shared.events_tx.send(InstanceEvent::info(message));
    }
}

async fn pump<R, F>(reader: R, tx: mpsc::Sender<StreamLine>, wrap: F)
where
    R: AsyncRead + Unpin,
    F: Fn(String) -> StreamLine,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("output stream failed: {e}");
                break;
            }
        }

        // Servers may print bytes in the platform's legacy encoding.
        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        if tx.send(wrap(line)).await.is_err() {
            break;
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Signals the server's process group so wrapper scripts and the JVM they
/// launch both see it. `force` sends SIGKILL instead of SIGTERM.
#[cfg(unix)]
fn terminate(child: &mut Child, force: bool) {
    use nix::{sys::signal::Signal, unistd::Pid};

    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Some(pid) = child.id() {
        if nix::sys::signal::killpg(Pid::from_raw(pid as i32), signal).is_ok() {
            return;
        }
    }
    _ = child.start_kill();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _force: bool) {
    _ = child.start_kill();
}
