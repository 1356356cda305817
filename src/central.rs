use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use async_lock::Mutex;
use log::{debug, warn};

use super::async_util::{with_timeout, Latch};
use super::connection::{ConnectedEvent, Connection, ConnectionRegistry};
use super::error::{Error, ErrorKind};
use super::native::CentralManager;
use super::scan::{ScanRelay, ScanSession, ScanStream};
use super::types::{Advertisement, DeviceId, ManagerState};
use super::Result;

/// Configuration of a [Central].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralConfig {
    /// How long [Central::connect] waits for the connect callback before cancelling
    /// the attempt. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Capacity of the sink created by [Central::scan]. Advertisements arriving while
    /// it is full are dropped.
    pub scan_buffer: usize,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            scan_buffer: 32,
        }
    }
}

/// The central manager facade.
///
/// Receives the native callbacks (see the `on_*` methods) and turns them into
/// latches, scan sink deliveries and connection registry updates that client code
/// can wait on. Clones share the same state.
#[derive(Clone)]
pub struct Central {
    pub(super) inner: Arc<CentralInner>,
}

pub(super) struct CentralInner {
    pub(super) manager: Box<dyn CentralManager>,
    pub(super) config: CentralConfig,
    /// Guards metadata only; never held across a delivery or a native call.
    pub(super) shared: Mutex<Shared>,
    pub(super) state_changed: Latch<()>,
    pub(super) connected: Latch<ConnectedEvent>,
    /// Serializes connection attempts, since `connected` has a single slot.
    connect_lock: Mutex<()>,
    /// Held across each relay update and its native scan toggle, so the toggles
    /// reach the manager in the order the sessions changed.
    scan_lock: Mutex<()>,
}

pub(super) struct Shared {
    pub(super) relay: ScanRelay,
    pub(super) registry: ConnectionRegistry,
}

impl std::fmt::Debug for Central {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("Central");
        f.field("config", &self.inner.config);
        f.field("state", &self.state());
        f.finish()
    }
}

impl Central {
    /// Creates a central with the default configuration.
    pub fn new(manager: impl CentralManager) -> Self {
        Self::with_config(manager, CentralConfig::default())
    }

    /// Creates a central with the given configuration.
    pub fn with_config(manager: impl CentralManager, config: CentralConfig) -> Self {
        Self {
            inner: Arc::new(CentralInner {
                manager: Box::new(manager),
                config,
                shared: Mutex::new(Shared {
                    relay: ScanRelay::new(),
                    registry: ConnectionRegistry::new(),
                }),
                state_changed: Latch::new(),
                connected: Latch::new(),
                connect_lock: Mutex::new(()),
                scan_lock: Mutex::new(()),
            }),
        }
    }

    /// The configuration this central was created with.
    pub fn config(&self) -> &CentralConfig {
        &self.inner.config
    }

    /// Current state reported by the native manager.
    pub fn state(&self) -> ManagerState {
        self.inner.manager.state()
    }

    /// Waits for the next state change notification. Notifications that arrived
    /// since the last wait are coalesced into one.
    ///
    /// Returns `false` if no notification can arrive any more, which only happens
    /// while the central is being torn down.
    pub async fn wait_state_changed(&self) -> bool {
        self.inner.state_changed.wait().await.is_some()
    }

    /// Blocking version of [Central::wait_state_changed].
    pub fn wait_state_changed_blocking(&self) -> bool {
        self.inner.state_changed.wait_blocking().is_some()
    }

    /// Consumes a pending state change notification, if any.
    pub fn try_state_changed(&self) -> bool {
        self.inner.state_changed.try_take().is_some()
    }

    /// Waits until the manager reports [ManagerState::PoweredOn].
    pub async fn wait_powered_on(&self) -> Result<()> {
        loop {
            match self.state() {
                ManagerState::PoweredOn => return Ok(()),
                st @ (ManagerState::Unsupported | ManagerState::Unauthorized) => {
                    return Err(Error::new(
                        ErrorKind::AdapterUnavailable,
                        None,
                        format!("central manager state is {st:?}"),
                    ));
                }
                st => debug!("waiting for the central manager to power on, state: {st:?}"),
            }
            if !self.wait_state_changed().await {
                return Err(Error::new(
                    ErrorKind::Internal,
                    None,
                    "state notifications ended",
                ));
            }
        }
    }

    /// Registers `sink` to receive discovered advertisements and starts scanning.
    ///
    /// Delivery never waits for the receiving side: advertisements that find `sink`
    /// full are dropped. Fails with [ErrorKind::AlreadyScanning] while another
    /// session is active.
    ///
    /// `sink` is registered only after the native manager accepted the request, so a
    /// failed start never receives anything.
    pub fn start_scan(&self, sink: Sender<Advertisement>) -> Result<ScanSession> {
        let _scan_lock = self.inner.scan_lock.lock_blocking();
        if self.inner.shared.lock_blocking().relay.is_active() {
            return Err(ErrorKind::AlreadyScanning.into());
        }
        if let Err(e) = self.inner.manager.scan(true) {
            warn!("failed to start scanning: {e}");
            return Err(e.into());
        }
        self.inner.shared.lock_blocking().relay.register(sink)
    }

    /// Stops the scan `session`. Does nothing if it is not the active session.
    ///
    /// No advertisement discovered after this returns reaches the session's sink.
    pub fn stop_scan(&self, session: &ScanSession) {
        let _scan_lock = self.inner.scan_lock.lock_blocking();
        let removed = self.inner.shared.lock_blocking().relay.unregister(session);
        if removed {
            if let Err(e) = self.inner.manager.scan(false) {
                warn!("failed to stop scanning: {e}");
            }
        }
    }

    /// Checks if a scan session is active.
    pub fn is_scanning(&self) -> bool {
        self.inner.shared.lock_blocking().relay.is_active()
    }

    /// Starts a scan session with an internal sink of [CentralConfig::scan_buffer]
    /// capacity; the session stops when the returned stream is dropped.
    pub fn scan(&self) -> Result<ScanStream> {
        let (sender, receiver) = async_channel::bounded(self.inner.config.scan_buffer.max(1));
        let session = self.start_scan(sender)?;
        Ok(ScanStream::new(self.clone(), session, receiver))
    }

    /// Connects to the peer `id` and waits for the outcome reported by the connect
    /// callback.
    ///
    /// Attempts are serialized. If [CentralConfig::connect_timeout] elapses, or this
    /// future is dropped before completion, the native attempt is cancelled.
    pub async fn connect(&self, id: &DeviceId) -> Result<Connection> {
        let _connect_lock = self.inner.connect_lock.lock().await;
        if let Some(stale) = self.inner.connected.try_take() {
            warn!("discarded a stale connect event: {stale:?}");
        }
        self.inner
            .manager
            .connect(id)
            .map_err(Error::connect_failed)?;

        let mut pending = PendingConnect {
            manager: &*self.inner.manager,
            id,
            finished: false,
        };
        let limit = self.inner.config.connect_timeout;
        let result = with_timeout(limit, self.wait_connected(id)).await;
        if let Some(result) = result {
            pending.finished = true;
            result
        } else {
            Err(Error::new(
                ErrorKind::Timeout,
                None,
                format!("no connect callback for {id} within {limit:?}"),
            ))
        }
    }

    /// Blocking version of [Central::connect].
    pub fn connect_blocking(&self, id: &DeviceId) -> Result<Connection> {
        futures_lite::future::block_on(self.connect(id))
    }

    async fn wait_connected(&self, id: &DeviceId) -> Result<Connection> {
        loop {
            let Some(event) = self.inner.connected.wait().await else {
                return Err(ErrorKind::Internal.into());
            };
            match event {
                ConnectedEvent::Connected(conn) if &conn.id() == id => return Ok(conn),
                ConnectedEvent::Connected(conn) => {
                    warn!("connected to {} while waiting for {id}", conn.id());
                }
                ConnectedEvent::Failed(err) => return Err(err),
            }
        }
    }

    /// Asks the native manager to tear down `conn`. Completion is observed through
    /// [Connection::wait_disconnected].
    pub fn disconnect(&self, conn: &Connection) {
        if conn.is_connected() {
            self.inner.manager.cancel_connect(&conn.id());
        }
    }

    /// Looks up the live connection with the peer `id`.
    pub fn find_connection(&self, id: &DeviceId) -> Option<Connection> {
        self.inner.shared.lock_blocking().registry.find(id)
    }

    /// Snapshot of all live connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.inner.shared.lock_blocking().registry.snapshot()
    }
}

/// Cancels the native connection attempt unless it was marked as finished.
struct PendingConnect<'a> {
    manager: &'a dyn CentralManager,
    id: &'a DeviceId,
    finished: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("cancelling connection attempt to {}", self.id);
            self.manager.cancel_connect(self.id);
        }
    }
}
