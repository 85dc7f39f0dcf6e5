/// Cluster topology tracking
///
/// The tracker folds change events from per-server monitors into a single
/// membership view and publishes it as immutable
/// [`ClusterDescription`](crate::core::ClusterDescription)
/// snapshots. Key pieces:
/// - `multi_server`: the tracker itself, owner of the server registry
/// - `reconcile`: per-cluster-type membership policies
/// - `publisher`: snapshot publication and predicate waits
/// - `selector`: server selection on top of published snapshots
pub mod multi_server;
pub mod publisher;
pub mod reconcile;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

pub use multi_server::MultiServerCluster;
pub use selector::{
    AnyServerSelector, LatencyServerSelector, PrimaryServerSelector, SecondaryServerSelector,
    ServerSelector,
};

use crate::core::{ChangeListener, ServerAddress, ServerDescription};
use std::sync::Arc;

/// A continuously monitored server
///
/// Implementations probe their host in the background and report every
/// observed change to the listener they were created with.
pub trait ClusterableServer: Send + Sync {
    fn address(&self) -> &ServerAddress;

    /// Latest description observed by this server's monitor
    fn description(&self) -> ServerDescription;

    /// Discard cached state and probe again as soon as possible
    fn invalidate(&self);

    /// Stop monitoring and release connections; idempotent
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Creates monitored servers for the tracker
pub trait ClusterableServerFactory: Send + Sync {
    fn create(
        &self,
        address: ServerAddress,
        listener: Arc<dyn ChangeListener<ServerDescription>>,
    ) -> Arc<dyn ClusterableServer>;
}
