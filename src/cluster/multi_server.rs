/// Topology tracker for replica sets, sharded clusters and standalone servers
///
/// Every tracked server gets its own monitor from the server factory. Their
/// change events are reconciled one at a time under a single mutation lock,
/// and each reconciliation ends by publishing a fresh [`ClusterDescription`].
///
/// Monitors may report synchronously while the lock is already held (while
/// seeding, adding a discovered member, or invalidating a stale primary).
/// Events therefore go through an inbox: whoever holds the lock drains it
/// before letting go, and a reporter that cannot take the lock leaves its
/// event for the holder.
use super::publisher::DescriptionPublisher;
use super::reconcile::{ReconcileContext, ReconcilePolicy, TopologyAction};
use super::selector::ServerSelector;
use super::{ClusterableServer, ClusterableServerFactory};
use crate::core::{
    ChangeEvent, ChangeListener, ClusterChangeEvent, ClusterConnectionMode, ClusterDescription,
    ClusterListener, ClusterSettings, ClusterType, ServerAddress, ServerChangeEvent,
    ServerDescription,
};
use crate::error::{ClusterError, ClusterResult};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

struct ServerEntry {
    server: Arc<dyn ClusterableServer>,
    description: ServerDescription,
}

/// Everything guarded by the mutation lock
struct TopologyState {
    cluster_type: ClusterType,
    replica_set_name: Option<String>,
    latest_set_version: Option<i32>,
    servers: BTreeMap<ServerAddress, ServerEntry>,
}

impl TopologyState {
    fn context(&self, seed_count: usize) -> ReconcileContext<'_> {
        ReconcileContext {
            replica_set_name: self.replica_set_name.as_deref(),
            latest_set_version: self.latest_set_version,
            seed_count,
            tracked: self.servers.values().map(|e| &e.description).collect(),
        }
    }
}

struct ClusterInner {
    cluster_id: String,
    settings: ClusterSettings,
    server_factory: Arc<dyn ClusterableServerFactory>,
    cluster_listener: Arc<dyn ClusterListener>,
    topology: Mutex<TopologyState>,
    inbox: Mutex<VecDeque<ServerChangeEvent>>,
    publisher: DescriptionPublisher,
    closed: AtomicBool,
    weak_self: Weak<ClusterInner>,
}

/// Forwards a monitor's events into the tracker without keeping it alive
struct ServerStateListener {
    cluster: Weak<ClusterInner>,
}

impl ChangeListener<ServerDescription> for ServerStateListener {
    fn state_changed(&self, event: ServerChangeEvent) {
        if let Some(cluster) = self.cluster.upgrade() {
            cluster.on_change(event);
        }
    }
}

/// Cluster tracker for deployments reached in
/// [`ClusterConnectionMode::Multiple`]
pub struct MultiServerCluster {
    inner: Arc<ClusterInner>,
}

impl MultiServerCluster {
    /// Create the tracker, start monitoring every seed host and publish the
    /// initial description
    ///
    /// # Panics
    ///
    /// Panics when `settings` are not in multiple connection mode.
    pub fn new<S: Into<String>>(
        cluster_id: S,
        settings: ClusterSettings,
        server_factory: Arc<dyn ClusterableServerFactory>,
        cluster_listener: Arc<dyn ClusterListener>,
    ) -> Self {
        assert_eq!(
            settings.mode(),
            ClusterConnectionMode::Multiple,
            "connection mode must be MULTIPLE"
        );

        let cluster_id = cluster_id.into();
        info!(
            "Cluster {} created with settings {}",
            cluster_id,
            settings.short_description()
        );

        let initial_state = TopologyState {
            cluster_type: settings.required_cluster_type(),
            replica_set_name: settings.required_replica_set_name().map(str::to_string),
            latest_set_version: None,
            servers: BTreeMap::new(),
        };
        let initial_description = ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            initial_state.cluster_type,
            Vec::new(),
        );

        let inner = Arc::new_cyclic(|weak_self| ClusterInner {
            cluster_id,
            settings,
            server_factory,
            cluster_listener,
            topology: Mutex::new(initial_state),
            inbox: Mutex::new(VecDeque::new()),
            publisher: DescriptionPublisher::new(initial_description),
            closed: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        });

        // Seed and publish in one critical section. Monitors reporting from
        // inside `create` only queue their events; they are reconciled once
        // the seeded description has been announced.
        let seeded = {
            let mut topology = inner.topology.lock();
            for address in inner.settings.hosts() {
                inner.add_server(&mut topology, address.clone());
            }
            inner.update_description(&topology)
        };

        inner.cluster_listener.cluster_opened(&inner.cluster_id);
        inner.fire_change_event(&seeded);
        inner.drain_events();

        Self { inner }
    }

    pub fn cluster_id(&self) -> &str {
        &self.inner.cluster_id
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.inner.settings
    }

    /// Most recently published description
    pub fn description(&self) -> Arc<ClusterDescription> {
        self.inner.publisher.current()
    }

    /// Wait for a published description satisfying `predicate`
    ///
    /// Fails with a timeout error when none is published within `timeout`,
    /// and with [`ClusterError::Closed`] once the cluster is closed.
    pub async fn current_description<P>(
        &self,
        predicate: P,
        timeout: Duration,
    ) -> ClusterResult<Arc<ClusterDescription>>
    where
        P: Fn(&ClusterDescription) -> bool,
    {
        self.inner.publisher.wait_for(predicate, timeout).await
    }

    /// Tracked server for `address`, if any
    pub fn get_server(
        &self,
        address: &ServerAddress,
    ) -> ClusterResult<Option<Arc<dyn ClusterableServer>>> {
        if self.is_closed() {
            return Err(ClusterError::Closed);
        }
        Ok(self.inner.lookup_server(address))
    }

    /// Pick a server matching `selector`, waiting up to `timeout` for one to
    /// appear
    pub async fn select_server(
        &self,
        selector: &dyn ServerSelector,
        timeout: Duration,
    ) -> ClusterResult<Arc<dyn ClusterableServer>> {
        let deadline = Instant::now() + timeout;
        let mut stale: Option<Arc<ClusterDescription>> = None;

        loop {
            if self.is_closed() {
                return Err(ClusterError::Closed);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let description = self
                .current_description(
                    |d| {
                        !stale.as_deref().is_some_and(|s| std::ptr::eq(s, d))
                            && !selector.select(d).is_empty()
                    },
                    remaining,
                )
                .await
                .map_err(|e| match e {
                    ClusterError::Timeout { .. } => ClusterError::timeout(
                        format!("a server matching {}", selector.describe()),
                        timeout,
                    ),
                    other => other,
                })?;

            let candidates = selector.select(&description);
            let chosen = candidates
                .choose(&mut rand::thread_rng())
                .map(|d| d.address().clone());
            if let Some(server) = chosen.and_then(|a| self.inner.lookup_server(&a)) {
                return Ok(server);
            }

            // Removed between publication and lookup; wait for a newer snapshot
            debug!(
                "Selected server vanished from cluster {}, retrying",
                self.inner.cluster_id
            );
            stale = Some(description);
        }
    }

    /// Stop monitoring every tracked server; idempotent
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Drop for MultiServerCluster {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl ClusterInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let topology = self.topology.lock();
            for entry in topology.servers.values() {
                entry.server.close();
            }
        }
        self.inbox.lock().clear();
        self.publisher.close();
        self.cluster_listener.cluster_closed(&self.cluster_id);
    }

    fn lookup_server(&self, address: &ServerAddress) -> Option<Arc<dyn ClusterableServer>> {
        let server = {
            let topology = self.topology.lock();
            topology
                .servers
                .get(address)
                .map(|entry| Arc::clone(&entry.server))
        };
        // Events that arrived while we held the lock are ours to reconcile
        self.drain_events();
        server
    }

    fn on_change(&self, event: ServerChangeEvent) {
        if self.is_closed() {
            return;
        }
        self.inbox.lock().push_back(event);
        self.drain_events();
    }

    /// Reconcile queued events until the inbox stays empty
    fn drain_events(&self) {
        loop {
            let Some(mut topology) = self.topology.try_lock() else {
                // The holder drains before it lets go
                return;
            };

            let mut changes = Vec::new();
            loop {
                let next = self.inbox.lock().pop_front();
                let Some(event) = next else { break };
                if self.is_closed() {
                    continue;
                }
                if let Some(change) = self.handle_change(&mut topology, event) {
                    changes.push(change);
                }
            }
            drop(topology);

            for change in &changes {
                self.fire_change_event(change);
            }

            if self.inbox.lock().is_empty() {
                return;
            }
        }
    }

    fn handle_change(
        &self,
        topology: &mut TopologyState,
        event: ServerChangeEvent,
    ) -> Option<ClusterChangeEvent> {
        let description = event.into_new_value();
        let address = description.address().clone();

        let Some(entry) = topology.servers.get_mut(&address) else {
            debug!("Ignoring change event for untracked server {}", address);
            return None;
        };
        entry.description = description.clone();

        if description.is_ok() {
            if topology.cluster_type == ClusterType::Unknown {
                topology.cluster_type = description.cluster_type();
                info!("Discovered cluster type of {}", topology.cluster_type);
            }

            if let Some(policy) = ReconcilePolicy::for_cluster_type(topology.cluster_type) {
                let actions = policy.plan(
                    &topology.context(self.settings.hosts().len()),
                    &description,
                );
                self.apply(topology, actions);
            }
        }

        Some(self.update_description(topology))
    }

    fn apply(&self, topology: &mut TopologyState, actions: Vec<TopologyAction>) {
        for action in actions {
            match action {
                TopologyAction::AdoptReplicaSetName(name) => {
                    info!("Adopting replica set name '{}'", name);
                    topology.replica_set_name = Some(name);
                }
                TopologyAction::RecordSetVersion(version) => {
                    topology.latest_set_version = Some(version);
                }
                TopologyAction::ResetClusterType => {
                    topology.cluster_type = ClusterType::Unknown;
                }
                TopologyAction::AddServer(address) => {
                    self.add_server(topology, address);
                }
                TopologyAction::RemoveServer { address, reason } => {
                    if reason.is_inconsistency() {
                        error!(
                            "{}. Removing {} from client view of cluster.",
                            reason, address
                        );
                    } else {
                        info!(
                            "Server {} is {}. Removing from client view of cluster.",
                            address, reason
                        );
                    }
                    self.remove_server(topology, &address);
                }
                TopologyAction::InvalidatePrimary(address) => {
                    if let Some(entry) = topology.servers.get_mut(&address) {
                        info!("Rediscovering type of existing primary {}", address);
                        entry.server.invalidate();
                        entry.description = ServerDescription::connecting(address);
                    }
                }
            }
        }
    }

    fn add_server(&self, topology: &mut TopologyState, address: ServerAddress) {
        if topology.servers.contains_key(&address) {
            return;
        }

        info!("Adding discovered server {} to client view of cluster", address);
        let listener = Arc::new(ServerStateListener {
            cluster: self.weak_self.clone(),
        });
        let server = self.server_factory.create(address.clone(), listener);
        topology.servers.insert(
            address.clone(),
            ServerEntry {
                server,
                description: ServerDescription::connecting(address),
            },
        );
    }

    /// # Panics
    ///
    /// Panics when `address` is not tracked.
    fn remove_server(&self, topology: &mut TopologyState, address: &ServerAddress) {
        let entry = topology
            .servers
            .remove(address)
            .unwrap_or_else(|| panic!("attempted to remove untracked server {}", address));
        entry.server.close();
    }

    fn update_description(&self, topology: &TopologyState) -> ClusterChangeEvent {
        let servers = topology
            .servers
            .values()
            .map(|entry| entry.description.clone())
            .collect();
        let description = Arc::new(ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            topology.cluster_type,
            servers,
        ));
        let previous = self.publisher.publish(Arc::clone(&description));
        ChangeEvent::new(previous, description)
    }

    fn fire_change_event(&self, event: &ClusterChangeEvent) {
        self.cluster_listener
            .cluster_description_changed(&self.cluster_id, event);
    }
}
