/// Membership reconciliation policies
///
/// Each policy is a pure function of the tracker's current view and one new
/// server description. It returns the list of topology actions the tracker
/// applies, in order, under its mutation lock.
use crate::core::{ClusterType, ServerAddress, ServerDescription, ServerType};
use std::collections::BTreeSet;
use std::fmt;

/// What the tracker knows when a description arrives
#[derive(Debug)]
pub struct ReconcileContext<'a> {
    pub replica_set_name: Option<&'a str>,
    pub latest_set_version: Option<i32>,
    pub seed_count: usize,
    pub tracked: Vec<&'a ServerDescription>,
}

impl ReconcileContext<'_> {
    fn is_tracked(&self, address: &ServerAddress) -> bool {
        self.tracked.iter().any(|d| d.address() == address)
    }
}

/// One step of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyAction {
    AdoptReplicaSetName(String),
    RecordSetVersion(i32),
    ResetClusterType,
    AddServer(ServerAddress),
    RemoveServer {
        address: ServerAddress,
        reason: RemovalReason,
    },
    InvalidatePrimary(ServerAddress),
}

/// Why a server leaves the client view of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    NotReplicaSetMember(ServerType),
    ReplicaSetNameMismatch {
        expected: String,
        found: Option<String>,
    },
    NotInReplicaSetConfig,
    NotShardRouter(ServerType),
    MultipleStandalones,
}

impl RemovalReason {
    /// Whether the removal signals a misconfigured or foreign server rather
    /// than an ordinary reconfiguration
    pub fn is_inconsistency(&self) -> bool {
        !matches!(self, RemovalReason::NotInReplicaSetConfig)
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::NotReplicaSetMember(found) => {
                write!(f, "expecting replica set member, but found a {}", found)
            }
            RemovalReason::ReplicaSetNameMismatch { expected, found } => write!(
                f,
                "expecting replica set member from set '{}', but found one from set '{}'",
                expected,
                found.as_deref().unwrap_or("<none>")
            ),
            RemovalReason::NotInReplicaSetConfig => {
                write!(f, "no longer a member of the replica set")
            }
            RemovalReason::NotShardRouter(found) => write!(
                f,
                "expecting a {}, but found a {}",
                ServerType::ShardRouter,
                found
            ),
            RemovalReason::MultipleStandalones => write!(
                f,
                "expecting a single {}, but found more than one",
                ServerType::Standalone
            ),
        }
    }
}

/// Reconciliation policy selected by the latched cluster type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    ReplicaSet,
    Sharded,
    Standalone,
}

impl ReconcilePolicy {
    pub fn for_cluster_type(cluster_type: ClusterType) -> Option<Self> {
        match cluster_type {
            ClusterType::ReplicaSet => Some(ReconcilePolicy::ReplicaSet),
            ClusterType::Sharded => Some(ReconcilePolicy::Sharded),
            ClusterType::Standalone => Some(ReconcilePolicy::Standalone),
            ClusterType::Unknown => None,
        }
    }

    pub fn plan(
        self,
        context: &ReconcileContext<'_>,
        description: &ServerDescription,
    ) -> Vec<TopologyAction> {
        match self {
            ReconcilePolicy::ReplicaSet => plan_replica_set_member(context, description),
            ReconcilePolicy::Sharded => plan_shard_router(description),
            ReconcilePolicy::Standalone => plan_standalone(context, description),
        }
    }
}

fn remove(description: &ServerDescription, reason: RemovalReason) -> TopologyAction {
    TopologyAction::RemoveServer {
        address: description.address().clone(),
        reason,
    }
}

fn plan_replica_set_member(
    context: &ReconcileContext<'_>,
    description: &ServerDescription,
) -> Vec<TopologyAction> {
    if !description.is_replica_set_member() {
        return vec![remove(
            description,
            RemovalReason::NotReplicaSetMember(description.server_type()),
        )];
    }

    let mut actions = Vec::new();

    let set_name = match context.replica_set_name {
        Some(name) => Some(name.to_string()),
        None => {
            let adopted = description.set_name().map(str::to_string);
            if let Some(name) = &adopted {
                actions.push(TopologyAction::AdoptReplicaSetName(name.clone()));
            }
            adopted
        }
    };

    if let Some(expected) = set_name {
        if description.set_name() != Some(expected.as_str()) {
            return vec![remove(
                description,
                RemovalReason::ReplicaSetNameMismatch {
                    expected,
                    found: description.set_name().map(str::to_string),
                },
            )];
        }
    }

    let mut removed = BTreeSet::new();
    let authoritative = match (description.set_version(), context.latest_set_version) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(version), Some(latest)) => version > latest,
    };

    if authoritative {
        if let Some(version) = description.set_version() {
            actions.push(TopologyAction::RecordSetVersion(version));
        }

        let mut added = BTreeSet::new();
        for address in parse_hosts(description.hosts().iter().chain(description.passives())) {
            if !context.is_tracked(&address) && added.insert(address.clone()) {
                actions.push(TopologyAction::AddServer(address));
            }
        }

        let members: BTreeSet<ServerAddress> = parse_hosts(description.all_members()).collect();
        for tracked in &context.tracked {
            if !members.contains(tracked.address()) {
                removed.insert(tracked.address().clone());
                actions.push(TopologyAction::RemoveServer {
                    address: tracked.address().clone(),
                    reason: RemovalReason::NotInReplicaSetConfig,
                });
            }
        }
    }

    if description.is_primary() {
        for tracked in &context.tracked {
            if tracked.address() != description.address()
                && tracked.is_primary()
                && !removed.contains(tracked.address())
            {
                actions.push(TopologyAction::InvalidatePrimary(tracked.address().clone()));
            }
        }
    }

    actions
}

fn plan_shard_router(description: &ServerDescription) -> Vec<TopologyAction> {
    if description.cluster_type() != ClusterType::Sharded {
        return vec![remove(
            description,
            RemovalReason::NotShardRouter(description.server_type()),
        )];
    }
    Vec::new()
}

fn plan_standalone(
    context: &ReconcileContext<'_>,
    description: &ServerDescription,
) -> Vec<TopologyAction> {
    if context.seed_count > 1 {
        return vec![
            TopologyAction::ResetClusterType,
            remove(description, RemovalReason::MultipleStandalones),
        ];
    }
    Vec::new()
}

/// Parse reported host strings, skipping any that are not valid addresses
fn parse_hosts<'a, I>(hosts: I) -> impl Iterator<Item = ServerAddress> + 'a
where
    I: Iterator<Item = &'a String> + 'a,
{
    hosts.filter_map(|host| match ServerAddress::parse(host) {
        Ok(address) => Some(address),
        Err(e) => {
            tracing::warn!("Ignoring reported replica set member: {}", e);
            None
        }
    })
}
