/// Publication of cluster descriptions and waiting for a matching one
use crate::core::ClusterDescription;
use crate::error::{ClusterError, ClusterResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Snapshot {
    description: Arc<ClusterDescription>,
    closed: bool,
}

/// Single published description, replaced atomically on every reconciliation
///
/// Every publication wakes all waiters; each one re-checks its own predicate
/// against the newest snapshot.
pub struct DescriptionPublisher {
    sender: watch::Sender<Snapshot>,
}

impl DescriptionPublisher {
    pub fn new(initial: ClusterDescription) -> Self {
        let (sender, _) = watch::channel(Snapshot {
            description: Arc::new(initial),
            closed: false,
        });
        Self { sender }
    }

    /// Currently published description
    pub fn current(&self) -> Arc<ClusterDescription> {
        Arc::clone(&self.sender.borrow().description)
    }

    /// Replace the published description, returning the one it replaced
    pub fn publish(&self, description: Arc<ClusterDescription>) -> Arc<ClusterDescription> {
        let mut previous = description;
        self.sender.send_modify(|snapshot| {
            std::mem::swap(&mut snapshot.description, &mut previous);
        });
        previous
    }

    /// Wake every waiter with the terminal closed condition
    pub fn close(&self) {
        self.sender.send_modify(|snapshot| snapshot.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.borrow().closed
    }

    /// Wait until a published description satisfies `predicate`
    ///
    /// Returns immediately when the current description already matches.
    /// Fails with [`ClusterError::Timeout`] when nothing matches within
    /// `timeout` and with [`ClusterError::Closed`] once the publisher closes.
    pub async fn wait_for<P>(
        &self,
        predicate: P,
        timeout: Duration,
    ) -> ClusterResult<Arc<ClusterDescription>>
    where
        P: Fn(&ClusterDescription) -> bool,
    {
        let mut receiver = self.sender.subscribe();
        let wait = async {
            let snapshot = receiver
                .wait_for(|snapshot| snapshot.closed || predicate(&snapshot.description))
                .await
                .map_err(|_| ClusterError::Closed)?;
            if snapshot.closed {
                return Err(ClusterError::Closed);
            }
            Ok(Arc::clone(&snapshot.description))
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::timeout(
                "a matching cluster description",
                timeout,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ClusterConnectionMode, ClusterType, ServerAddress, ServerConnectionState,
        ServerDescription, ServerType,
    };

    fn empty() -> ClusterDescription {
        ClusterDescription::new(ClusterConnectionMode::Multiple, ClusterType::Unknown, Vec::new())
    }

    fn with_primary() -> ClusterDescription {
        let primary = ServerDescription::builder(ServerAddress::new("a", 27017))
            .state(ServerConnectionState::Connected)
            .ok(true)
            .server_type(ServerType::ReplicaSetPrimary)
            .build();
        ClusterDescription::new(
            ClusterConnectionMode::Multiple,
            ClusterType::ReplicaSet,
            vec![primary],
        )
    }

    #[test]
    fn test_publish_returns_previous() {
        let publisher = DescriptionPublisher::new(empty());
        let first = publisher.current();

        let previous = publisher.publish(Arc::new(with_primary()));
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(publisher.current().has_primary());
    }

    #[test]
    fn test_wait_from_blocking_caller() {
        let publisher = DescriptionPublisher::new(with_primary());
        let description = tokio_test::block_on(
            publisher.wait_for(|d| d.has_primary(), Duration::from_millis(10)),
        );
        tokio_test::assert_ok!(description);

        let missing =
            tokio_test::block_on(publisher.wait_for(|d| d.is_connecting(), Duration::from_millis(10)));
        tokio_test::assert_err!(missing);
    }

    #[tokio::test]
    async fn test_wait_returns_current_when_satisfied() {
        let publisher = DescriptionPublisher::new(with_primary());
        let description = publisher
            .wait_for(|d| d.has_primary(), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(description.has_primary());
    }

    #[tokio::test]
    async fn test_wait_is_woken_by_publication() {
        let publisher = Arc::new(DescriptionPublisher::new(empty()));

        let waiter = {
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move {
                publisher
                    .wait_for(|d| d.has_primary(), Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        publisher.publish(Arc::new(empty()));
        publisher.publish(Arc::new(with_primary()));

        let description = waiter.await.unwrap().unwrap();
        assert!(description.has_primary());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let publisher = DescriptionPublisher::new(empty());
        let result = publisher
            .wait_for(|_| false, Duration::from_millis(10))
            .await;
        match result {
            Err(error) => assert!(error.is_timeout()),
            Ok(_) => panic!("Expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_close_ends_waits() {
        let publisher = Arc::new(DescriptionPublisher::new(empty()));

        let waiter = {
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move {
                publisher
                    .wait_for(|d| d.has_primary(), Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        publisher.close();

        assert!(matches!(waiter.await.unwrap(), Err(ClusterError::Closed)));
        assert!(publisher.is_closed());

        // Later waits fail fast as well
        let result = publisher.wait_for(|_| true, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ClusterError::Closed)));
    }
}
