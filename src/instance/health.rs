use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use tokio::{net::TcpStream, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::ProcessSupervisor;

/// Polls the server's port on loopback. A process can be alive for a long
/// time before it accepts connections; only a successful connect makes the
/// instance Online.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitor {
    addr: SocketAddr,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(port: u16, interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            interval,
            probe_timeout,
        }
    }

    /// One plain TCP connect; nothing is sent.
    pub async fn probe(&self) -> bool {
        matches!(
            timeout(self.probe_timeout, TcpStream::connect(self.addr)).await,
            Ok(Ok(_))
        )
    }

    /// Ticks until `token` is cancelled or the supervisor no longer holds
    /// `run`'s process.
    pub(crate) async fn run(self, supervisor: ProcessSupervisor, run: u64, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let reachable = tokio::select! {
                _ = token.cancelled() => break,
                reachable = self.probe() => reachable,
            };
            trace!(addr = %self.addr, reachable, "health probe");

            if !supervisor.report_health(run, &token, reachable).await {
                break;
            }
        }
    }
}
