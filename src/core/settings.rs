/// Cluster settings handed to the tracker at construction
use super::{ClusterConnectionMode, ClusterType, ServerAddress};
use crate::error::{ClusterError, ClusterResult};

/// Validated, immutable cluster settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    hosts: Vec<ServerAddress>,
    mode: ClusterConnectionMode,
    required_cluster_type: ClusterType,
    required_replica_set_name: Option<String>,
}

impl ClusterSettings {
    pub fn builder() -> ClusterSettingsBuilder {
        ClusterSettingsBuilder::default()
    }

    /// Seed hosts, deduplicated, in the order they were given
    pub fn hosts(&self) -> &[ServerAddress] {
        &self.hosts
    }

    pub fn mode(&self) -> ClusterConnectionMode {
        self.mode
    }

    pub fn required_cluster_type(&self) -> ClusterType {
        self.required_cluster_type
    }

    pub fn required_replica_set_name(&self) -> Option<&str> {
        self.required_replica_set_name.as_deref()
    }

    pub fn short_description(&self) -> String {
        let hosts: Vec<String> = self.hosts.iter().map(ToString::to_string).collect();
        let mut description = format!(
            "hosts=[{}], mode={}, requiredClusterType={}",
            hosts.join(", "),
            self.mode,
            self.required_cluster_type
        );
        if let Some(name) = &self.required_replica_set_name {
            description.push_str(&format!(", requiredReplicaSetName={}", name));
        }
        description
    }
}

/// Builder for [`ClusterSettings`]
#[derive(Debug, Clone)]
pub struct ClusterSettingsBuilder {
    hosts: Vec<ServerAddress>,
    mode: ClusterConnectionMode,
    required_cluster_type: ClusterType,
    required_replica_set_name: Option<String>,
}

impl Default for ClusterSettingsBuilder {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            mode: ClusterConnectionMode::Multiple,
            required_cluster_type: ClusterType::Unknown,
            required_replica_set_name: None,
        }
    }
}

impl ClusterSettingsBuilder {
    pub fn hosts<I>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = ServerAddress>,
    {
        self.hosts = hosts.into_iter().collect();
        self
    }

    pub fn mode(mut self, mode: ClusterConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn required_cluster_type(mut self, cluster_type: ClusterType) -> Self {
        self.required_cluster_type = cluster_type;
        self
    }

    pub fn required_replica_set_name<S: Into<String>>(mut self, name: S) -> Self {
        self.required_replica_set_name = Some(name.into());
        self
    }

    /// Validate and build the settings
    ///
    /// A required replica set name implies a replica set deployment; asking
    /// for any other cluster type alongside it is rejected.
    pub fn build(self) -> ClusterResult<ClusterSettings> {
        if self.hosts.is_empty() {
            return Err(ClusterError::validation("at least one seed host is required"));
        }

        let mut hosts: Vec<ServerAddress> = Vec::with_capacity(self.hosts.len());
        for host in self.hosts {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        if self.mode == ClusterConnectionMode::Single && hosts.len() > 1 {
            return Err(ClusterError::validation(
                "single connection mode requires exactly one host",
            ));
        }

        let mut required_cluster_type = self.required_cluster_type;
        if let Some(name) = &self.required_replica_set_name {
            if name.trim().is_empty() {
                return Err(ClusterError::validation("replica set name cannot be empty"));
            }
            match required_cluster_type {
                ClusterType::Unknown => required_cluster_type = ClusterType::ReplicaSet,
                ClusterType::ReplicaSet => {}
                other => {
                    return Err(ClusterError::validation(format!(
                        "a replica set name requires cluster type {}, not {}",
                        ClusterType::ReplicaSet,
                        other
                    )))
                }
            }
        }

        Ok(ClusterSettings {
            hosts,
            mode: self.mode,
            required_cluster_type,
            required_replica_set_name: self.required_replica_set_name,
        })
    }
}
