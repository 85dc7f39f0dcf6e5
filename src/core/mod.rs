/// Core data model shared by the tracker, the monitors and the selectors
pub mod address;
pub mod description;
pub mod event;
pub mod settings;

pub use address::ServerAddress;
pub use description::{ClusterDescription, ServerDescription, ServerDescriptionBuilder};
pub use event::{
    ChangeEvent, ChangeListener, ClusterChangeEvent, ClusterListener, LoggingClusterListener,
    NoOpClusterListener, ServerChangeEvent,
};
pub use settings::{ClusterSettings, ClusterSettingsBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the client connects to the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterConnectionMode {
    /// One fixed server, no discovery
    Single,
    /// A tracked, changing set of servers
    Multiple,
}

/// Classification of the whole deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    #[default]
    Unknown,
    ReplicaSet,
    Sharded,
    Standalone,
}

/// Role a single server reported for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerType {
    #[default]
    Unknown,
    Standalone,
    ReplicaSetPrimary,
    ReplicaSetSecondary,
    ReplicaSetArbiter,
    ReplicaSetOther,
    ShardRouter,
}

/// Connection state of a monitored server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerConnectionState {
    #[default]
    Connecting,
    Connected,
    Unconnected,
}

impl ServerType {
    /// The cluster type a server of this role implies
    pub fn cluster_type(self) -> ClusterType {
        match self {
            ServerType::Standalone => ClusterType::Standalone,
            ServerType::ReplicaSetPrimary
            | ServerType::ReplicaSetSecondary
            | ServerType::ReplicaSetArbiter
            | ServerType::ReplicaSetOther => ClusterType::ReplicaSet,
            ServerType::ShardRouter => ClusterType::Sharded,
            ServerType::Unknown => ClusterType::Unknown,
        }
    }

    pub fn is_replica_set_member(self) -> bool {
        self.cluster_type() == ClusterType::ReplicaSet
    }
}

impl fmt::Display for ClusterConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterConnectionMode::Single => write!(f, "SINGLE"),
            ClusterConnectionMode::Multiple => write!(f, "MULTIPLE"),
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterType::Unknown => write!(f, "UNKNOWN"),
            ClusterType::ReplicaSet => write!(f, "REPLICA_SET"),
            ClusterType::Sharded => write!(f, "SHARDED"),
            ClusterType::Standalone => write!(f, "STANDALONE"),
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerType::Unknown => "UNKNOWN",
            ServerType::Standalone => "STANDALONE",
            ServerType::ReplicaSetPrimary => "REPLICA_SET_PRIMARY",
            ServerType::ReplicaSetSecondary => "REPLICA_SET_SECONDARY",
            ServerType::ReplicaSetArbiter => "REPLICA_SET_ARBITER",
            ServerType::ReplicaSetOther => "REPLICA_SET_OTHER",
            ServerType::ShardRouter => "SHARD_ROUTER",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ServerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerConnectionState::Connecting => write!(f, "CONNECTING"),
            ServerConnectionState::Connected => write!(f, "CONNECTED"),
            ServerConnectionState::Unconnected => write!(f, "UNCONNECTED"),
        }
    }
}
