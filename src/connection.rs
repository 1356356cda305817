use std::collections::HashMap;
use std::sync::Arc;

use super::async_util::CompletionSignal;
use super::error::{Error, NativeError};
use super::native::PeerHandle;
use super::types::DeviceId;

/// An established link to a remote peer.
///
/// Clones refer to the same link. A reconnection to the same peer produces a new
/// `Connection` that is not equal to the old one.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: DeviceId,
    peer: Arc<dyn PeerHandle>,
    done: CompletionSignal<Option<Error>>,
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("Connection");
        f.field("id", &self.inner.id);
        f.field("connected", &self.is_connected());
        f.finish()
    }
}

impl Connection {
    pub(crate) fn new(peer: Arc<dyn PeerHandle>) -> Result<Self, NativeError> {
        let id = peer.identifier()?;
        Ok(Self {
            inner: Arc::new(ConnectionInner {
                id,
                peer,
                done: CompletionSignal::new(),
            }),
        })
    }

    /// Returns the peer's identifier.
    pub fn id(&self) -> DeviceId {
        self.inner.id.clone()
    }

    /// The native peer handle this connection was created from.
    pub fn peer(&self) -> &Arc<dyn PeerHandle> {
        &self.inner.peer
    }

    /// Returns `false` once the link has terminated.
    pub fn is_connected(&self) -> bool {
        !self.inner.done.is_closed()
    }

    /// Waits until the link terminates.
    pub async fn wait_disconnected(&self) {
        self.inner.done.wait().await
    }

    /// Blocking version of [Connection::wait_disconnected].
    pub fn wait_disconnected_blocking(&self) {
        self.inner.done.wait_blocking()
    }

    /// The error reported by the native layer when the link terminated, if any.
    pub fn disconnect_reason(&self) -> Option<Error> {
        self.inner.done.value().cloned().flatten()
    }

    /// Marks the link as terminated. Only the first call has an effect.
    pub(crate) fn close(&self, reason: Option<Error>) -> bool {
        self.inner.done.close(reason)
    }
}

/// Outcome of one connection attempt, posted by the connect callback.
#[derive(Debug)]
pub enum ConnectedEvent {
    /// The link is up and registered.
    Connected(Connection),
    /// The attempt failed; nothing was registered.
    Failed(Error),
}

/// Live connections keyed by normalized peer address.
///
/// Guarded by the coarse lock of [crate::Central], like the scan relay.
pub(crate) struct ConnectionRegistry {
    conns: HashMap<DeviceId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: HashMap::new(),
        }
    }

    /// Registers `conn`, returning the connection it replaced.
    pub fn insert(&mut self, conn: Connection) -> Option<Connection> {
        self.conns.insert(conn.id(), conn)
    }

    pub fn find(&self, id: &DeviceId) -> Option<Connection> {
        self.conns.get(id).cloned()
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<Connection> {
        self.conns.remove(id)
    }

    pub fn snapshot(&self) -> Vec<Connection> {
        self.conns.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }
}
