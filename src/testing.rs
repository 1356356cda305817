//! Test doubles for the native side.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::NativeError;
use crate::native::{CentralManager, PeerHandle};
use crate::types::{DeviceId, ManagerState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Scan(bool),
    Connect(DeviceId),
    CancelConnect(DeviceId),
}

#[derive(Default)]
struct MockState {
    state: ManagerState,
    fail_scan: bool,
    fail_connect: bool,
    scan_delay: Option<Duration>,
    radio_on: bool,
    requests: Vec<Request>,
}

/// Records every request and answers with configurable results.
#[derive(Clone, Default)]
pub struct MockManager {
    inner: Arc<Mutex<MockState>>,
}

impl MockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: ManagerState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn fail_scan(&self, fail: bool) {
        self.inner.lock().unwrap().fail_scan = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.inner.lock().unwrap().fail_connect = fail;
    }

    /// Makes every scan toggle sleep for `delay` before taking effect.
    pub fn set_scan_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().scan_delay = Some(delay);
    }

    /// Whether the last accepted scan toggle turned scanning on.
    pub fn radio_on(&self) -> bool {
        self.inner.lock().unwrap().radio_on
    }

    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Polls until `request` has been recorded; panics after one second.
    pub fn wait_for(&self, request: &Request) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while !self.requests().contains(request) {
            assert!(Instant::now() < deadline, "{request:?} was never requested");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl CentralManager for MockManager {
    fn state(&self) -> ManagerState {
        self.inner.lock().unwrap().state
    }

    fn scan(&self, enable: bool) -> Result<(), NativeError> {
        let delay = self.inner.lock().unwrap().scan_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_scan {
            return Err(NativeError::Message("scan refused".into()));
        }
        inner.radio_on = enable;
        inner.requests.push(Request::Scan(enable));
        Ok(())
    }

    fn connect(&self, id: &DeviceId) -> Result<(), NativeError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_connect {
            return Err(NativeError::PeerUnavailable);
        }
        inner.requests.push(Request::Connect(id.clone()));
        Ok(())
    }

    fn cancel_connect(&self, id: &DeviceId) {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(Request::CancelConnect(id.clone()));
    }
}

/// Peer handle with a fixed identifier, or none at all.
pub struct MockPeer {
    id: Option<DeviceId>,
}

impl MockPeer {
    pub fn new(id: &str) -> Arc<dyn PeerHandle> {
        Arc::new(Self {
            id: Some(DeviceId::new(id)),
        })
    }

    pub fn unavailable() -> Arc<dyn PeerHandle> {
        Arc::new(Self { id: None })
    }
}

impl PeerHandle for MockPeer {
    fn identifier(&self) -> Result<DeviceId, NativeError> {
        self.id.clone().ok_or(NativeError::PeerUnavailable)
    }
}
