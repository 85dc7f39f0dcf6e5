/// Change notifications flowing from monitors to the tracker and from the
/// tracker to its listener
use super::{ClusterDescription, ServerDescription};
use std::sync::Arc;

/// A value transition: what was observed before and what is observed now
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
    old_value: T,
    new_value: T,
}

impl<T> ChangeEvent<T> {
    pub fn new(old_value: T, new_value: T) -> Self {
        Self {
            old_value,
            new_value,
        }
    }

    pub fn old_value(&self) -> &T {
        &self.old_value
    }

    pub fn new_value(&self) -> &T {
        &self.new_value
    }

    pub fn into_new_value(self) -> T {
        self.new_value
    }
}

pub type ServerChangeEvent = ChangeEvent<ServerDescription>;
pub type ClusterChangeEvent = ChangeEvent<Arc<ClusterDescription>>;

/// Receives state transitions of a single value
pub trait ChangeListener<T>: Send + Sync {
    fn state_changed(&self, event: ChangeEvent<T>);
}

/// Observer of a cluster's lifecycle
///
/// Callbacks never run while the tracker holds its mutation lock, so an
/// implementation may call back into the cluster.
pub trait ClusterListener: Send + Sync {
    fn cluster_opened(&self, _cluster_id: &str) {}

    fn cluster_description_changed(&self, _cluster_id: &str, _event: &ClusterChangeEvent) {}

    fn cluster_closed(&self, _cluster_id: &str) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpClusterListener;

impl ClusterListener for NoOpClusterListener {}

/// Listener that logs every lifecycle event
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingClusterListener;

impl ClusterListener for LoggingClusterListener {
    fn cluster_opened(&self, cluster_id: &str) {
        tracing::info!("Cluster {} opened", cluster_id);
    }

    fn cluster_description_changed(&self, cluster_id: &str, event: &ClusterChangeEvent) {
        if event.old_value() == event.new_value() {
            tracing::debug!(
                "Cluster {} description unchanged: {}",
                cluster_id,
                event.new_value().short_description()
            );
        } else {
            tracing::info!(
                "Cluster {} description changed: {}",
                cluster_id,
                event.new_value().short_description()
            );
        }
    }

    fn cluster_closed(&self, cluster_id: &str) {
        tracing::info!("Cluster {} closed", cluster_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClusterConnectionMode, ClusterType, ServerAddress};
    use std::sync::Mutex;

    struct Recorder {
        events: Mutex<Vec<ServerChangeEvent>>,
    }

    impl ChangeListener<ServerDescription> for Recorder {
        fn state_changed(&self, event: ServerChangeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_change_event_accessors() {
        let address = ServerAddress::new("a", 27017);
        let old = ServerDescription::connecting(address.clone());
        let new = ServerDescription::unconnected(address, "refused");
        let event = ChangeEvent::new(old.clone(), new.clone());

        assert_eq!(event.old_value(), &old);
        assert_eq!(event.new_value(), &new);
        assert_eq!(event.into_new_value(), new);
    }

    #[test]
    fn test_change_listener_receives_events() {
        let recorder = Recorder {
            events: Mutex::new(Vec::new()),
        };
        let address = ServerAddress::new("a", 27017);
        recorder.state_changed(ChangeEvent::new(
            ServerDescription::connecting(address.clone()),
            ServerDescription::unconnected(address, "refused"),
        ));
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_default_listeners_accept_events() {
        let description = Arc::new(ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            ClusterType::Unknown,
            Vec::new(),
        ));
        let event = ChangeEvent::new(Arc::clone(&description), description);

        for listener in [
            &NoOpClusterListener as &dyn ClusterListener,
            &LoggingClusterListener as &dyn ClusterListener,
        ] {
            listener.cluster_opened("test");
            listener.cluster_description_changed("test", &event);
            listener.cluster_closed("test");
        }
    }
}
