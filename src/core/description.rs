/// Immutable snapshots of server and cluster state
use super::{ClusterConnectionMode, ClusterType, ServerAddress, ServerConnectionState, ServerType};
use std::collections::BTreeSet;
use std::time::Duration;

/// What one probe observed about one server
///
/// Built once per observation and never mutated; a newer observation replaces
/// the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescription {
    address: ServerAddress,
    state: ServerConnectionState,
    ok: bool,
    server_type: ServerType,
    set_name: Option<String>,
    set_version: Option<i32>,
    hosts: BTreeSet<String>,
    passives: BTreeSet<String>,
    arbiters: BTreeSet<String>,
    primary: Option<String>,
    round_trip_time: Duration,
    error: Option<String>,
}

impl ServerDescription {
    pub fn builder(address: ServerAddress) -> ServerDescriptionBuilder {
        ServerDescriptionBuilder::new(address)
    }

    /// Placeholder for a server that has not answered its first probe yet
    pub fn connecting(address: ServerAddress) -> Self {
        Self::builder(address)
            .state(ServerConnectionState::Connecting)
            .build()
    }

    /// Description of a failed probe
    pub fn unconnected<S: Into<String>>(address: ServerAddress, reason: S) -> Self {
        Self::builder(address)
            .state(ServerConnectionState::Unconnected)
            .error(reason)
            .build()
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn state(&self) -> ServerConnectionState {
        self.state
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    /// Whether the last probe got a healthy reply
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }

    pub fn set_version(&self) -> Option<i32> {
        self.set_version
    }

    pub fn hosts(&self) -> &BTreeSet<String> {
        &self.hosts
    }

    pub fn passives(&self) -> &BTreeSet<String> {
        &self.passives
    }

    pub fn arbiters(&self) -> &BTreeSet<String> {
        &self.arbiters
    }

    /// Primary as reported by this member, if it knows one
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn round_trip_time(&self) -> Duration {
        self.round_trip_time
    }

    /// Reason of the last probe failure
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cluster_type(&self) -> ClusterType {
        self.server_type.cluster_type()
    }

    pub fn is_primary(&self) -> bool {
        self.ok && self.server_type == ServerType::ReplicaSetPrimary
    }

    pub fn is_secondary(&self) -> bool {
        self.ok && self.server_type == ServerType::ReplicaSetSecondary
    }

    pub fn is_replica_set_member(&self) -> bool {
        self.ok && self.server_type.is_replica_set_member()
    }

    pub fn is_shard_router(&self) -> bool {
        self.ok && self.server_type == ServerType::ShardRouter
    }

    pub fn is_standalone(&self) -> bool {
        self.ok && self.server_type == ServerType::Standalone
    }

    /// Every member this server lists in its replica set configuration
    pub fn all_members(&self) -> impl Iterator<Item = &String> {
        self.hosts
            .iter()
            .chain(self.passives.iter())
            .chain(self.arbiters.iter())
    }

    /// Equality ignoring round trip time, which drifts on every probe
    pub fn has_same_state(&self, other: &ServerDescription) -> bool {
        self.address == other.address
            && self.state == other.state
            && self.ok == other.ok
            && self.server_type == other.server_type
            && self.set_name == other.set_name
            && self.set_version == other.set_version
            && self.hosts == other.hosts
            && self.passives == other.passives
            && self.arbiters == other.arbiters
            && self.primary == other.primary
            && self.error == other.error
    }
}

/// Builder for [`ServerDescription`]
#[derive(Debug, Clone)]
pub struct ServerDescriptionBuilder {
    description: ServerDescription,
}

impl ServerDescriptionBuilder {
    fn new(address: ServerAddress) -> Self {
        Self {
            description: ServerDescription {
                address,
                state: ServerConnectionState::Connecting,
                ok: false,
                server_type: ServerType::Unknown,
                set_name: None,
                set_version: None,
                hosts: BTreeSet::new(),
                passives: BTreeSet::new(),
                arbiters: BTreeSet::new(),
                primary: None,
                round_trip_time: Duration::ZERO,
                error: None,
            },
        }
    }

    pub fn state(mut self, state: ServerConnectionState) -> Self {
        self.description.state = state;
        self
    }

    pub fn ok(mut self, ok: bool) -> Self {
        self.description.ok = ok;
        self
    }

    pub fn server_type(mut self, server_type: ServerType) -> Self {
        self.description.server_type = server_type;
        self
    }

    pub fn set_name<S: Into<String>>(mut self, set_name: S) -> Self {
        self.description.set_name = Some(set_name.into());
        self
    }

    pub fn set_version(mut self, set_version: i32) -> Self {
        self.description.set_version = Some(set_version);
        self
    }

    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn passives<I, S>(mut self, passives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description.passives = passives.into_iter().map(Into::into).collect();
        self
    }

    pub fn arbiters<I, S>(mut self, arbiters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description.arbiters = arbiters.into_iter().map(Into::into).collect();
        self
    }

    pub fn primary<S: Into<String>>(mut self, primary: S) -> Self {
        self.description.primary = Some(primary.into());
        self
    }

    pub fn round_trip_time(mut self, round_trip_time: Duration) -> Self {
        self.description.round_trip_time = round_trip_time;
        self
    }

    pub fn error<S: Into<String>>(mut self, error: S) -> Self {
        self.description.error = Some(error.into());
        self
    }

    pub fn build(self) -> ServerDescription {
        self.description
    }
}

/// Snapshot of the whole deployment as the tracker last reconciled it
///
/// Servers are kept in address order and every address appears once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescription {
    connection_mode: ClusterConnectionMode,
    cluster_type: ClusterType,
    servers: Vec<ServerDescription>,
}

impl ClusterDescription {
    pub fn new(
        connection_mode: ClusterConnectionMode,
        cluster_type: ClusterType,
        servers: Vec<ServerDescription>,
    ) -> Self {
        Self {
            connection_mode,
            cluster_type,
            servers,
        }
    }

    pub fn connection_mode(&self) -> ClusterConnectionMode {
        self.connection_mode
    }

    pub fn cluster_type(&self) -> ClusterType {
        self.cluster_type
    }

    pub fn servers(&self) -> &[ServerDescription] {
        &self.servers
    }

    pub fn server(&self, address: &ServerAddress) -> Option<&ServerDescription> {
        self.servers.iter().find(|s| s.address() == address)
    }

    pub fn primaries(&self) -> Vec<&ServerDescription> {
        self.servers.iter().filter(|s| s.is_primary()).collect()
    }

    pub fn secondaries(&self) -> Vec<&ServerDescription> {
        self.servers.iter().filter(|s| s.is_secondary()).collect()
    }

    /// Servers whose last probe succeeded
    pub fn any(&self) -> Vec<&ServerDescription> {
        self.servers.iter().filter(|s| s.is_ok()).collect()
    }

    pub fn has_primary(&self) -> bool {
        self.servers.iter().any(|s| s.is_primary())
    }

    /// Whether some server is still waiting for its first probe
    pub fn is_connecting(&self) -> bool {
        self.servers
            .iter()
            .any(|s| s.state() == ServerConnectionState::Connecting)
    }

    /// One-line summary used in log messages
    pub fn short_description(&self) -> String {
        let servers: Vec<String> = self
            .servers
            .iter()
            .map(|s| format!("{}={}/{}", s.address(), s.state(), s.server_type()))
            .collect();
        format!(
            "{{type={}, servers=[{}]}}",
            self.cluster_type,
            servers.join(", ")
        )
    }
}
