/// Server selection over published cluster descriptions
use crate::core::{ClusterDescription, ServerDescription, ServerType};
use std::time::Duration;

/// Server selection trait
pub trait ServerSelector: Send + Sync {
    /// Candidates in `description` suitable for this selector
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription>;

    /// Human readable name used in timeout errors and logs
    fn describe(&self) -> String;
}

/// Selects the replica set primary, or any standalone or router
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryServerSelector;

impl ServerSelector for PrimaryServerSelector {
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription> {
        description
            .servers()
            .iter()
            .filter(|s| s.is_primary() || s.is_standalone() || s.is_shard_router())
            .cloned()
            .collect()
    }

    fn describe(&self) -> String {
        "primary".to_string()
    }
}

/// Selects healthy replica set secondaries
#[derive(Debug, Default, Clone, Copy)]
pub struct SecondaryServerSelector;

impl ServerSelector for SecondaryServerSelector {
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription> {
        description.secondaries().into_iter().cloned().collect()
    }

    fn describe(&self) -> String {
        "secondary".to_string()
    }
}

/// Selects any healthy server that can serve data
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyServerSelector;

impl ServerSelector for AnyServerSelector {
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription> {
        description
            .any()
            .into_iter()
            .filter(|s| {
                !matches!(
                    s.server_type(),
                    ServerType::ReplicaSetArbiter | ServerType::Unknown
                )
            })
            .cloned()
            .collect()
    }

    fn describe(&self) -> String {
        "any server".to_string()
    }
}

/// Narrows another selector's candidates to those within `acceptable_latency`
/// of the fastest one
#[derive(Debug, Clone)]
pub struct LatencyServerSelector<S> {
    inner: S,
    acceptable_latency: Duration,
}

impl<S: ServerSelector> LatencyServerSelector<S> {
    pub fn new(inner: S, acceptable_latency: Duration) -> Self {
        Self {
            inner,
            acceptable_latency,
        }
    }

    pub fn acceptable_latency(&self) -> Duration {
        self.acceptable_latency
    }
}

impl<S: ServerSelector> ServerSelector for LatencyServerSelector<S> {
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription> {
        let candidates = self.inner.select(description);
        let Some(fastest) = candidates.iter().map(|s| s.round_trip_time()).min() else {
            return candidates;
        };

        let limit = fastest.saturating_add(self.acceptable_latency);
        candidates
            .into_iter()
            .filter(|s| s.round_trip_time() <= limit)
            .collect()
    }

    fn describe(&self) -> String {
        format!(
            "{} within {:?} of the fastest",
            self.inner.describe(),
            self.acceptable_latency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ClusterConnectionMode, ClusterType, ServerAddress, ServerConnectionState,
    };

    fn server(host: &str, server_type: ServerType, rtt_ms: u64) -> ServerDescription {
        ServerDescription::builder(ServerAddress::new(host, 27017))
            .state(ServerConnectionState::Connected)
            .ok(true)
            .server_type(server_type)
            .set_name("rs0")
            .round_trip_time(Duration::from_millis(rtt_ms))
            .build()
    }

    fn replica_set() -> ClusterDescription {
        ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            ClusterType::ReplicaSet,
            vec![
                server("a", ServerType::ReplicaSetPrimary, 5),
                server("b", ServerType::ReplicaSetSecondary, 2),
                server("c", ServerType::ReplicaSetSecondary, 40),
                server("d", ServerType::ReplicaSetArbiter, 1),
                ServerDescription::connecting(ServerAddress::new("e", 27017)),
            ],
        )
    }

    fn hosts(servers: &[ServerDescription]) -> Vec<&str> {
        servers.iter().map(|s| s.address().host()).collect()
    }

    #[test]
    fn test_primary_selector() {
        let selected = PrimaryServerSelector.select(&replica_set());
        assert_eq!(hosts(&selected), ["a"]);

        let empty = ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            ClusterType::Unknown,
            Vec::new(),
        );
        assert!(PrimaryServerSelector.select(&empty).is_empty());
    }

    #[test]
    fn test_secondary_selector() {
        let selected = SecondaryServerSelector.select(&replica_set());
        assert_eq!(hosts(&selected), ["b", "c"]);
    }

    #[test]
    fn test_any_selector_skips_arbiters_and_unknown() {
        let selected = AnyServerSelector.select(&replica_set());
        assert_eq!(hosts(&selected), ["a", "b", "c"]);
    }

    #[test]
    fn test_latency_selector() {
        let selector = LatencyServerSelector::new(AnyServerSelector, Duration::from_millis(15));
        let selected = selector.select(&replica_set());
        assert_eq!(hosts(&selected), ["a", "b"]);
        assert!(selector.describe().starts_with("any server"));

        let wide = LatencyServerSelector::new(SecondaryServerSelector, Duration::from_secs(1));
        assert_eq!(hosts(&wide.select(&replica_set())), ["b", "c"]);
    }

    #[test]
    fn test_standalone_counts_as_primary() {
        let standalone = ServerDescription::builder(ServerAddress::new("s", 27017))
            .state(ServerConnectionState::Connected)
            .ok(true)
            .server_type(ServerType::Standalone)
            .build();
        let description = ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            ClusterType::Standalone,
            vec![standalone],
        );
        assert_eq!(hosts(&PrimaryServerSelector.select(&description)), ["s"]);
    }
}
