/// Background server monitoring
pub mod tcp;

pub use tcp::TcpProber;

use crate::cluster::{ClusterableServer, ClusterableServerFactory};
use crate::core::{ChangeEvent, ChangeListener, ServerAddress, ServerDescription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Server prober trait
#[async_trait]
pub trait ServerProber: Send + Sync {
    /// Probe a server once and describe what was observed
    async fn probe(&self, address: &ServerAddress) -> ServerDescription;

    /// Get the pause between two probes of the same server
    fn heartbeat_interval(&self) -> Duration;

    /// Get the timeout for a single probe
    fn probe_timeout(&self) -> Duration;
}

struct MonitorShared {
    address: ServerAddress,
    description: Mutex<ServerDescription>,
    listener: Arc<dyn ChangeListener<ServerDescription>>,
    wakeup: Notify,
    closed: AtomicBool,
}

impl MonitorShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Store a fresh observation, notifying the listener when it differs
    fn record(&self, description: ServerDescription) {
        let old = {
            let mut current = self.description.lock();
            if current.has_same_state(&description) {
                *current = description;
                return;
            }
            std::mem::replace(&mut *current, description.clone())
        };

        debug!(
            "Server {} changed from {}/{} to {}/{}",
            self.address,
            old.state(),
            old.server_type(),
            description.state(),
            description.server_type()
        );
        self.listener.state_changed(ChangeEvent::new(old, description));
    }
}

/// A [`ClusterableServer`] probed by a tokio task
pub struct ServerMonitor {
    shared: Arc<MonitorShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerMonitor {
    /// Start monitoring `address` on `runtime`
    pub fn start(
        address: ServerAddress,
        prober: Arc<dyn ServerProber>,
        listener: Arc<dyn ChangeListener<ServerDescription>>,
        runtime: &Handle,
    ) -> Arc<Self> {
        let shared = Arc::new(MonitorShared {
            description: Mutex::new(ServerDescription::connecting(address.clone())),
            address,
            listener,
            wakeup: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let task = runtime.spawn(run_monitor(Arc::clone(&shared), prober));
        Arc::new(Self {
            shared,
            task: Mutex::new(Some(task)),
        })
    }
}

async fn run_monitor(shared: Arc<MonitorShared>, prober: Arc<dyn ServerProber>) {
    let heartbeat_interval = prober.heartbeat_interval();
    let probe_timeout = prober.probe_timeout();

    while !shared.is_closed() {
        let description = match timeout(probe_timeout, prober.probe(&shared.address)).await {
            Ok(description) => description,
            Err(_) => {
                warn!("Probe of {} timed out", shared.address);
                ServerDescription::unconnected(
                    shared.address.clone(),
                    format!("probe timed out after {:?}", probe_timeout),
                )
            }
        };

        if shared.is_closed() {
            break;
        }
        shared.record(description);

        tokio::select! {
            _ = tokio::time::sleep(heartbeat_interval) => {}
            _ = shared.wakeup.notified() => {
                debug!("Monitor for {} woken early", shared.address);
            }
        }
    }

    debug!("Monitor for {} stopped", shared.address);
}

impl ClusterableServer for ServerMonitor {
    fn address(&self) -> &ServerAddress {
        &self.shared.address
    }

    fn description(&self) -> ServerDescription {
        self.shared.description.lock().clone()
    }

    fn invalidate(&self) {
        if self.shared.is_closed() {
            return;
        }
        *self.shared.description.lock() = ServerDescription::connecting(self.shared.address.clone());
        self.shared.wakeup.notify_one();
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.shared.wakeup.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates a [`ServerMonitor`] per tracked address, all sharing one prober
pub struct ServerMonitorFactory {
    prober: Arc<dyn ServerProber>,
    runtime: Handle,
}

impl ServerMonitorFactory {
    pub fn new(prober: Arc<dyn ServerProber>, runtime: Handle) -> Self {
        Self { prober, runtime }
    }
}

impl ClusterableServerFactory for ServerMonitorFactory {
    fn create(
        &self,
        address: ServerAddress,
        listener: Arc<dyn ChangeListener<ServerDescription>>,
    ) -> Arc<dyn ClusterableServer> {
        debug!("Starting monitor for {}", address);
        ServerMonitor::start(address, Arc::clone(&self.prober), listener, &self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ServerChangeEvent, ServerConnectionState, ServerType};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    /// Answers with the scripted roles in order, repeating the last one
    struct ScriptedProber {
        roles: Vec<ServerType>,
        probes: AtomicUsize,
        heartbeat_interval: Duration,
        delay: Duration,
    }

    impl ScriptedProber {
        fn new(roles: Vec<ServerType>, heartbeat_interval: Duration) -> Arc<Self> {
            Arc::new(Self {
                roles,
                probes: AtomicUsize::new(0),
                heartbeat_interval,
                delay: Duration::ZERO,
            })
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ServerProber for ScriptedProber {
        async fn probe(&self, address: &ServerAddress) -> ServerDescription {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let role = self.roles[n.min(self.roles.len() - 1)];
            ServerDescription::builder(address.clone())
                .state(ServerConnectionState::Connected)
                .ok(true)
                .server_type(role)
                .round_trip_time(Duration::from_micros(n as u64))
                .build()
        }

        fn heartbeat_interval(&self) -> Duration {
            self.heartbeat_interval
        }

        fn probe_timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
    }

    struct ChannelListener {
        sender: mpsc::UnboundedSender<ServerChangeEvent>,
    }

    impl ChangeListener<ServerDescription> for ChannelListener {
        fn state_changed(&self, event: ServerChangeEvent) {
            let _ = self.sender.send(event);
        }
    }

    fn start(
        prober: Arc<dyn ServerProber>,
    ) -> (Arc<ServerMonitor>, mpsc::UnboundedReceiver<ServerChangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let monitor = ServerMonitor::start(
            ServerAddress::new("localhost", 27017),
            prober,
            Arc::new(ChannelListener { sender }),
            &Handle::current(),
        );
        (monitor, receiver)
    }

    async fn next_event(
        receiver: &mut mpsc::UnboundedReceiver<ServerChangeEvent>,
    ) -> ServerChangeEvent {
        timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("no change event within a second")
            .expect("listener dropped")
    }

    #[tokio::test]
    async fn test_first_probe_is_reported() {
        let prober = ScriptedProber::new(vec![ServerType::Standalone], Duration::from_secs(60));
        let (monitor, mut events) = start(prober);
        assert_eq!(monitor.description().state(), ServerConnectionState::Connecting);

        let event = next_event(&mut events).await;
        assert_eq!(event.old_value().state(), ServerConnectionState::Connecting);
        assert_eq!(event.new_value().server_type(), ServerType::Standalone);
        assert_eq!(monitor.description().server_type(), ServerType::Standalone);
    }

    #[tokio::test]
    async fn test_unchanged_probes_are_not_reported() {
        let prober = ScriptedProber::new(vec![ServerType::Standalone], Duration::from_millis(5));
        let (_monitor, mut events) = start(Arc::clone(&prober) as Arc<dyn ServerProber>);

        next_event(&mut events).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(prober.probes() > 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalidate_triggers_immediate_probe() {
        let prober = ScriptedProber::new(
            vec![ServerType::ReplicaSetPrimary, ServerType::ReplicaSetSecondary],
            Duration::from_secs(60),
        );
        let (monitor, mut events) = start(prober);

        let first = next_event(&mut events).await;
        assert_eq!(first.new_value().server_type(), ServerType::ReplicaSetPrimary);

        monitor.invalidate();
        let second = next_event(&mut events).await;
        assert_eq!(second.old_value().state(), ServerConnectionState::Connecting);
        assert_eq!(second.new_value().server_type(), ServerType::ReplicaSetSecondary);
    }

    #[tokio::test]
    async fn test_close_stops_probing() {
        let prober = ScriptedProber::new(vec![ServerType::Standalone], Duration::from_millis(5));
        let (monitor, mut events) = start(Arc::clone(&prober) as Arc<dyn ServerProber>);
        next_event(&mut events).await;

        monitor.close();
        monitor.close();
        assert!(monitor.is_closed());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let probes = prober.probes();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(prober.probes(), probes);
    }

    #[tokio::test]
    async fn test_slow_probe_reports_timeout() {
        let prober = Arc::new(ScriptedProber {
            roles: vec![ServerType::Standalone],
            probes: AtomicUsize::new(0),
            heartbeat_interval: Duration::from_secs(60),
            delay: Duration::from_millis(500),
        });
        let (_monitor, mut events) = start(prober);

        let event = next_event(&mut events).await;
        assert_eq!(event.new_value().state(), ServerConnectionState::Unconnected);
        assert!(event.new_value().error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_factory_creates_running_monitors() {
        let prober = ScriptedProber::new(vec![ServerType::ShardRouter], Duration::from_secs(60));
        let factory = ServerMonitorFactory::new(prober, Handle::current());
        let (sender, mut events) = mpsc::unbounded_channel();

        let server = factory.create(
            ServerAddress::new("mongos", 27017),
            Arc::new(ChannelListener { sender }),
        );
        assert_eq!(server.address(), &ServerAddress::new("mongos", 27017));

        let event = next_event(&mut events).await;
        assert!(event.new_value().is_shard_router());
        server.close();
    }
}
