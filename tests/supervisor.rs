#![cfg(all(unix, feature = "provision"))]

mod common;

use std::{path::Path, time::Duration};

use minehost::{
    CommandChannel, LifecycleState, MineHostServer, ProcessSupervisor, ServerInstance,
    SupervisorSettings, Variant,
    config::{EventPayload, InstanceEvent},
    error::ServerError,
};
use tokio::{net::TcpListener, sync::watch, time::timeout};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

fn instance(root: &Path, port: u16) -> ServerInstance {
    ServerInstance {
        root_dir: root.to_path_buf(),
        port,
        variant: Variant::Paper,
        version: "1.20.1".into(),
        ram_gb: 1,
        jar_path: None,
        launch: Vec::new(),
    }
}

fn settings() -> SupervisorSettings {
    SupervisorSettings {
        runtime: "sh".into(),
        health_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(500),
        stop_grace: Duration::from_secs(2),
    }
}

fn supervisor_with_script(root: &Path, port: u16, body: &str) -> ProcessSupervisor {
    common::write_script(&root.join("start.sh"), body);
    ProcessSupervisor::new(instance(root, port), settings())
}

async fn wait_for(rx: &mut watch::Receiver<LifecycleState>, want: LifecycleState) {
    timeout(Duration::from_secs(5), rx.wait_for(|state| *state == want))
        .await
        .unwrap_or_else(|_| panic!("never reached {want}"))
        .unwrap();
}

#[tokio::test]
async fn reachable_port_goes_online_and_stop_goes_offline() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let supervisor = supervisor_with_script(dir.path(), port, "echo booting\nexec cat");

    let mut events = supervisor.subscribe();
    let mut state = supervisor.watch_state();
    supervisor.start().await.unwrap();
    assert!(supervisor.is_running().await);

    wait_for(&mut state, LifecycleState::Online).await;

    let mut saw_output = false;
    let mut saw_starting = false;
    while let Ok(Some(Ok(event))) = timeout(Duration::from_millis(200), events.next()).await {
        match event.payload {
            EventPayload::StdLine { line } if line.line == "booting" => saw_output = true,
            EventPayload::StateChange {
                old: LifecycleState::Offline,
                new: LifecycleState::Starting,
            } => saw_starting = true,
            _ => {}
        }
    }
    assert!(saw_output);
    assert!(saw_starting);

    supervisor.stop().await;
    assert_eq!(supervisor.state(), LifecycleState::Offline);
    assert!(!supervisor.is_running().await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.state(), LifecycleState::Offline);
    while let Ok(Some(Ok(event))) = timeout(Duration::from_millis(100), events.next()).await {
        if let EventPayload::StateChange { new, .. } = event.payload {
            assert_eq!(new, LifecycleState::Offline);
        }
    }
}

#[tokio::test]
async fn closed_port_stays_starting_until_process_exits() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(
        dir.path(),
        port,
        "read line\necho \"got $line\"\nexit 0",
    );

    let mut state = supervisor.watch_state();
    supervisor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.state(), LifecycleState::Starting);

    supervisor.write_line("save-all").await.unwrap();
    wait_for(&mut state, LifecycleState::Offline).await;
    assert!(!supervisor.is_running().await);

    // The exited run can be started again.
    supervisor.start().await.unwrap();
    assert_eq!(supervisor.state(), LifecycleState::Starting);
    supervisor.stop().await;
}

#[tokio::test]
async fn second_start_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(dir.path(), port, "exec cat");

    supervisor.start().await.unwrap();
    assert!(matches!(
        supervisor.start().await,
        Err(ServerError::AlreadyRunning)
    ));
    supervisor.stop().await;
}

#[tokio::test]
async fn missing_runtime_leaves_server_offline() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("paper-1.20.1.jar"), b"jar").unwrap();
    let settings = SupervisorSettings::default().with_runtime("minehost-no-such-java");
    let supervisor = ProcessSupervisor::new(instance(dir.path(), 25565), settings);

    let result = supervisor.start().await;
    assert!(matches!(result, Err(ServerError::RuntimeNotFound(_))));
    assert_eq!(supervisor.state(), LifecycleState::Offline);
    assert!(!supervisor.is_running().await);
}

#[tokio::test]
async fn stop_and_kill_while_offline() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::new(instance(dir.path(), 25565), settings());

    supervisor.stop().await;
    assert_eq!(supervisor.state(), LifecycleState::Offline);
    assert!(matches!(supervisor.kill().await, Err(ServerError::NotRunning)));
}

#[tokio::test]
async fn kill_ends_the_process_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(dir.path(), port, "trap '' TERM\nexec cat");

    supervisor.start().await.unwrap();
    supervisor.kill().await.unwrap();
    assert_eq!(supervisor.state(), LifecycleState::Offline);
}

#[tokio::test]
async fn commands_need_a_running_server() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::new(instance(dir.path(), 25565), settings());
    let mut console = CommandChannel::new(supervisor);

    assert!(matches!(
        console.send("say hi").await,
        Err(ServerError::NotRunning)
    ));
    assert!(console.history().is_empty());

    console.send("   ").await.unwrap();
    assert!(console.history().is_empty());
}

#[tokio::test]
async fn console_records_and_recalls_sent_commands() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    common::write_script(&dir.path().join("start.sh"), "exec cat");
    let server = MineHostServer::new(instance(dir.path(), port), settings());

    let mut events = server.subscribe();
    server.start().await.unwrap();
    for line in ["list", "list", "say hello"] {
        server.send_command(line).await.unwrap();
    }

    let mut echoed = Vec::new();
    while echoed.len() < 3 {
        let Ok(Some(Ok(event))) = timeout(Duration::from_secs(5), events.next()).await else {
            break;
        };
        if let EventPayload::StdLine { line } = event.payload {
            echoed.push(line.line);
        }
    }
    assert_eq!(echoed, ["list", "list", "say hello"]);

    assert_eq!(server.recall_previous().await.as_deref(), Some("say hello"));
    assert_eq!(server.recall_previous().await.as_deref(), Some("list"));
    assert_eq!(server.recall_previous().await.as_deref(), Some("list"));
    assert_eq!(server.recall_next().await.as_deref(), Some("say hello"));
    assert_eq!(server.recall_next().await, None);

    server.stop().await;
}

async fn next_line(events: &mut BroadcastStream<InstanceEvent>) -> Option<String> {
    loop {
        let Ok(Some(Ok(event))) = timeout(Duration::from_secs(5), events.next()).await else {
            return None;
        };
        if let EventPayload::StdLine { line } = event.payload {
            return Some(line.line);
        }
    }
}

#[tokio::test]
async fn invalid_utf8_output_keeps_the_run_alive() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(
        dir.path(),
        port,
        "printf 'caf\\xe9\\n'\nprintf 'caf\\xe9\\n' >&2\nsleep 0.5\necho still-alive\nexec cat",
    );

    let mut events = supervisor.subscribe();
    supervisor.start().await.unwrap();

    let mut lines = Vec::new();
    while lines.len() < 3 {
        match next_line(&mut events).await {
            Some(line) => lines.push(line),
            None => break,
        }
    }
    assert_eq!(lines.iter().filter(|l| l.as_str() == "caf\u{fffd}").count(), 2, "{lines:?}");
    assert_eq!(lines.last().map(String::as_str), Some("still-alive"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.state(), LifecycleState::Starting);
    assert!(supervisor.is_running().await);
    supervisor.stop().await;
}

#[tokio::test]
async fn shutdown_waits_for_a_graceful_exit() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(
        dir.path(),
        port,
        "trap 'sleep 1; touch saved; exit 0' TERM\nwhile true; do sleep 0.1; done",
    );

    supervisor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();
    assert_eq!(supervisor.state(), LifecycleState::Offline);
    assert!(dir.path().join("saved").is_file());

    // Nothing left to wait for.
    timeout(Duration::from_millis(100), supervisor.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn closed_stdin_is_a_delivery_error() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(dir.path(), port, "exec 0<&-\necho closed\nsleep 5");

    let mut events = supervisor.subscribe();
    supervisor.start().await.unwrap();
    assert_eq!(next_line(&mut events).await.as_deref(), Some("closed"));

    let mut console = CommandChannel::new(supervisor.clone());
    let result = console.send("say hi").await;
    assert!(matches!(result, Err(ServerError::CommandDelivery(_))), "{result:?}");
    assert!(console.history().is_empty());

    supervisor.stop().await;
}

#[tokio::test]
async fn online_server_exiting_goes_offline() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let supervisor = supervisor_with_script(dir.path(), port, "read line\nexit 0");

    let mut state = supervisor.watch_state();
    supervisor.start().await.unwrap();
    wait_for(&mut state, LifecycleState::Online).await;

    supervisor.write_line("stop").await.unwrap();
    wait_for(&mut state, LifecycleState::Offline).await;
    assert!(!supervisor.is_running().await);

    // The listener is still up, yet no later tick may revive the run.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.state(), LifecycleState::Offline);
}

#[tokio::test]
async fn stalled_input_does_not_block_commands_or_stop() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let supervisor = supervisor_with_script(
        dir.path(),
        port,
        "trap 'exit 0' TERM\nwhile true; do sleep 0.1; done",
    );
    supervisor.start().await.unwrap();

    let flood = "x".repeat(256 * 1024);
    let result = timeout(Duration::from_secs(3), supervisor.write_line(&flood))
        .await
        .unwrap();
    assert!(matches!(result, Err(ServerError::CommandDelivery(_))));

    timeout(Duration::from_secs(5), supervisor.stop())
        .await
        .unwrap();
    assert_eq!(supervisor.state(), LifecycleState::Offline);
}
