//! The seam between this crate and the platform's central manager.
//!
//! The platform binding implements [CentralManager] for the outbound requests and
//! feeds the inbound callbacks into [crate::Central] (see `on_state_changed`,
//! `on_discover`, `on_connect` and `on_disconnect`).

use crate::error::NativeError;
use crate::types::{DeviceId, ManagerState};

/// Outbound requests to the native central manager.
///
/// Every method is expected to return promptly; results arrive later through the
/// callback entry points of [crate::Central].
pub trait CentralManager: Send + Sync + 'static {
    /// Current state of the radio.
    fn state(&self) -> ManagerState;

    /// Starts (`true`) or stops (`false`) scanning for advertisements.
    fn scan(&self, enable: bool) -> Result<(), NativeError>;

    /// Requests a connection to the peer; the outcome is reported by `on_connect`.
    fn connect(&self, id: &DeviceId) -> Result<(), NativeError>;

    /// Cancels a pending connection attempt or tears down an established link.
    fn cancel_connect(&self, id: &DeviceId);
}

/// Opaque handle of a remote peer as passed into the callbacks.
pub trait PeerHandle: Send + Sync + 'static {
    /// Resolves the peer's identifier.
    ///
    /// This may fail when the native object is already invalid, in which case the
    /// connect callback reports a failed connection.
    fn identifier(&self) -> Result<DeviceId, NativeError>;
}

impl std::fmt::Debug for dyn PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.identifier() {
            Ok(id) => write!(f, "PeerHandle({id})"),
            Err(_) => f.write_str("PeerHandle(<unavailable>)"),
        }
    }
}
