//! Bridges the callbacks of a Bluetooth LE central manager into waitable primitives.
//!
//! The native framework reports state changes, discovered advertisements, connections
//! and disconnections on a notification thread that must never be stalled. [Central]
//! receives those callbacks through its `on_*` methods and exposes them to client code
//! as a coalescing state latch, a scan sink relay, a connect latch and a connection
//! registry, all of which can be waited on with async or blocking calls.
//!
//! The platform binding implements [CentralManager] and [PeerHandle]; nothing in this
//! crate talks to the radio directly.

pub use central::{Central, CentralConfig};
pub use connection::{ConnectedEvent, Connection};
pub use error::{Error, ErrorKind, NativeError};
pub use native::{CentralManager, PeerHandle};
pub use scan::{ScanSession, ScanStream};
pub use types::*;

/// Convenience alias for a result with [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub use uuid::Uuid;
pub mod error;
mod types;

mod async_util;
mod callback;
mod central;
mod connection;
mod native;
mod scan;

#[cfg(test)]
mod testing;
