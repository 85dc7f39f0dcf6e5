/// Vigia - cluster topology tracking for MongoDB deployments
///
/// Vigia watches every member of a replica set, sharded cluster or standalone
/// deployment and keeps one consistent, immutable view of who is in the
/// cluster and which role each member plays:
/// 1. Monitors probe each host in the background and report changes
/// 2. The tracker reconciles those reports into membership decisions
/// 3. Readers wait for, or select servers from, published descriptions
pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod monitor;

pub use cluster::{ClusterableServer, ClusterableServerFactory, MultiServerCluster};
pub use error::{ClusterError, ClusterResult};
