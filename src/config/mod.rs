/// Configuration management for vigia

pub use crate::error::ConfigError;

use crate::core::{ClusterConnectionMode, ClusterSettings, ClusterType, ServerAddress};
use crate::error::ClusterResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main vigia configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster to track
    pub cluster: ClusterConfig,
    /// Server monitoring configuration
    pub monitor: MonitorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Seed hosts, `host` or `host:port`
    pub hosts: Vec<String>,
    /// Connection mode (single, multiple)
    pub mode: ClusterConnectionMode,
    /// Cluster type the deployment must have (unknown discovers it)
    #[serde(default)]
    pub required_cluster_type: ClusterType,
    /// Replica set name the members must report
    pub replica_set_name: Option<String>,
    /// How long to wait for a suitable server in milliseconds
    pub server_selection_timeout_ms: u64,
}

/// Server monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between probes of one server in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Timeout of a single probe in milliseconds
    pub heartbeat_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig {
                hosts: vec!["127.0.0.1:27017".to_string()],
                mode: ClusterConnectionMode::Multiple,
                required_cluster_type: ClusterType::Unknown,
                replica_set_name: None,
                server_selection_timeout_ms: 30_000,
            },
            monitor: MonitorConfig {
                heartbeat_interval_ms: 10_000,
                heartbeat_timeout_ms: 5_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.hosts.is_empty() {
            return Err(ConfigError::ValidationError(
                "cluster hosts cannot be empty".to_string(),
            ));
        }

        for host in &self.cluster.hosts {
            ServerAddress::parse(host).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.cluster.mode == ClusterConnectionMode::Single && self.cluster.hosts.len() > 1 {
            return Err(ConfigError::ValidationError(
                "single connection mode requires exactly one host".to_string(),
            ));
        }

        if let Some(name) = &self.cluster.replica_set_name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "replica_set_name cannot be empty".to_string(),
                ));
            }
            if !matches!(
                self.cluster.required_cluster_type,
                ClusterType::Unknown | ClusterType::ReplicaSet
            ) {
                return Err(ConfigError::ValidationError(format!(
                    "replica_set_name requires cluster type {}, not {}",
                    ClusterType::ReplicaSet,
                    self.cluster.required_cluster_type
                )));
            }
        }

        if self.cluster.server_selection_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server_selection_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.monitor.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.monitor.heartbeat_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.monitor.heartbeat_timeout_ms > self.monitor.heartbeat_interval_ms {
            return Err(ConfigError::ValidationError(
                "heartbeat_timeout_ms must not exceed heartbeat_interval_ms".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Settings for the cluster tracker
    pub fn cluster_settings(&self) -> ClusterResult<ClusterSettings> {
        let hosts = self
            .cluster
            .hosts
            .iter()
            .map(|host| ServerAddress::parse(host))
            .collect::<ClusterResult<Vec<_>>>()?;

        let mut builder = ClusterSettings::builder()
            .hosts(hosts)
            .mode(self.cluster.mode)
            .required_cluster_type(self.cluster.required_cluster_type);
        if let Some(name) = &self.cluster.replica_set_name {
            builder = builder.required_replica_set_name(name.clone());
        }
        builder.build()
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.server_selection_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.heartbeat_timeout_ms)
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, kind: &str) -> Result<(), ConfigError> {
        let defaults = Config::default();
        let cluster = match kind {
            "replica-set" => ClusterConfig {
                hosts: vec![
                    "10.0.1.10:27017".to_string(),
                    "10.0.1.11:27017".to_string(),
                    "10.0.1.12:27017".to_string(),
                ],
                required_cluster_type: ClusterType::ReplicaSet,
                replica_set_name: Some("rs0".to_string()),
                ..defaults.cluster
            },
            "sharded" => ClusterConfig {
                hosts: vec![
                    "10.0.2.10:27017".to_string(),
                    "10.0.2.11:27017".to_string(),
                ],
                required_cluster_type: ClusterType::Sharded,
                ..defaults.cluster
            },
            "standalone" => ClusterConfig {
                hosts: vec!["10.0.3.10:27017".to_string()],
                required_cluster_type: ClusterType::Standalone,
                ..defaults.cluster
            },
            _ => {
                return Err(ConfigError::ValidationError(
                    "Kind must be 'replica-set', 'sharded' or 'standalone'".to_string(),
                ))
            }
        };

        let config = Config {
            cluster,
            ..defaults
        };
        config.save_to_file(path)
    }
}
