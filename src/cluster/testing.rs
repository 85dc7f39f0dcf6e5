//! In-memory servers for exercising the tracker without a network
use super::{ClusterableServer, ClusterableServerFactory};
use crate::core::{
    ChangeEvent, ChangeListener, ServerAddress, ServerConnectionState, ServerDescription,
    ServerType,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) fn address(s: &str) -> ServerAddress {
    ServerAddress::parse(s).unwrap()
}

pub(crate) fn replica_set_member(
    addr: &str,
    server_type: ServerType,
    set_name: &str,
    hosts: &[&str],
    version: Option<i32>,
) -> ServerDescription {
    let mut builder = ServerDescription::builder(address(addr))
        .state(ServerConnectionState::Connected)
        .ok(true)
        .server_type(server_type)
        .set_name(set_name)
        .hosts(hosts.iter().copied());
    if let Some(version) = version {
        builder = builder.set_version(version);
    }
    builder.build()
}

pub(crate) fn server_of_type(addr: &str, server_type: ServerType) -> ServerDescription {
    ServerDescription::builder(address(addr))
        .state(ServerConnectionState::Connected)
        .ok(true)
        .server_type(server_type)
        .build()
}

/// Server whose observations are pushed by the test
pub(crate) struct MockServer {
    address: ServerAddress,
    description: Mutex<ServerDescription>,
    listener: Arc<dyn ChangeListener<ServerDescription>>,
    closed: AtomicBool,
    close_count: AtomicUsize,
    invalidate_count: AtomicUsize,
}

impl MockServer {
    /// Deliver a new observation to the tracker, as a monitor would
    pub(crate) fn report(&self, description: ServerDescription) {
        let old = std::mem::replace(&mut *self.description.lock(), description.clone());
        self.listener.state_changed(ChangeEvent::new(old, description));
    }

    pub(crate) fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate_count(&self) -> usize {
        self.invalidate_count.load(Ordering::SeqCst)
    }
}

impl ClusterableServer for MockServer {
    fn address(&self) -> &ServerAddress {
        &self.address
    }

    fn description(&self) -> ServerDescription {
        self.description.lock().clone()
    }

    fn invalidate(&self) {
        self.invalidate_count.fetch_add(1, Ordering::SeqCst);
        *self.description.lock() = ServerDescription::connecting(self.address.clone());
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

type CreateHook = Box<dyn Fn(&MockServer) + Send + Sync>;

/// Factory handing out [`MockServer`]s and remembering every one it created
#[derive(Default)]
pub(crate) struct MockServerFactory {
    servers: Mutex<HashMap<ServerAddress, Arc<MockServer>>>,
    created: Mutex<Vec<Arc<MockServer>>>,
    on_create: Option<CreateHook>,
}

impl MockServerFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Factory that runs `hook` synchronously inside `create`, before the
    /// tracker has registered the new server
    pub(crate) fn with_hook<F>(hook: F) -> Arc<Self>
    where
        F: Fn(&MockServer) + Send + Sync + 'static,
    {
        Arc::new(Self {
            on_create: Some(Box::new(hook)),
            ..Self::default()
        })
    }

    /// Most recently created server for `addr`
    pub(crate) fn server(&self, addr: &str) -> Arc<MockServer> {
        let servers = self.servers.lock();
        match servers.get(&address(addr)) {
            Some(server) => Arc::clone(server),
            None => panic!("no server was created for {}", addr),
        }
    }

    pub(crate) fn created(&self) -> Vec<Arc<MockServer>> {
        self.created.lock().clone()
    }
}

impl ClusterableServerFactory for MockServerFactory {
    fn create(
        &self,
        address: ServerAddress,
        listener: Arc<dyn ChangeListener<ServerDescription>>,
    ) -> Arc<dyn ClusterableServer> {
        let server = Arc::new(MockServer {
            description: Mutex::new(ServerDescription::connecting(address.clone())),
            address: address.clone(),
            listener,
            closed: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
            invalidate_count: AtomicUsize::new(0),
        });
        self.servers.lock().insert(address, Arc::clone(&server));
        self.created.lock().push(Arc::clone(&server));
        if let Some(hook) = &self.on_create {
            hook(&server);
        }
        server
    }
}
