/// TCP reachability prober

use super::ServerProber;
use crate::core::{ServerAddress, ServerConnectionState, ServerDescription, ServerType};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Prober that only verifies a server accepts TCP connections
///
/// Reachable servers are reported as connected with an unknown role and
/// `ok` unset, so the tracker keeps them without drawing topology
/// conclusions. Identifying the role requires the handshake command.
pub struct TcpProber {
    heartbeat_interval: Duration,
    probe_timeout: Duration,
}

impl TcpProber {
    pub fn new() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_intervals(heartbeat_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            heartbeat_interval,
            probe_timeout,
        }
    }
}

#[async_trait::async_trait]
impl ServerProber for TcpProber {
    async fn probe(&self, address: &ServerAddress) -> ServerDescription {
        tracing::debug!("Probing {}", address);

        let started = Instant::now();
        match TcpStream::connect((address.host(), address.port())).await {
            Ok(_stream) => ServerDescription::builder(address.clone())
                .state(ServerConnectionState::Connected)
                .server_type(ServerType::Unknown)
                .round_trip_time(started.elapsed())
                .build(),
            Err(e) => {
                ServerDescription::unconnected(address.clone(), format!("Connection failed: {}", e))
            }
        }
    }

    fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new()
    }
}
