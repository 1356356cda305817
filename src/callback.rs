//! Entry points for the native central manager callbacks.
//!
//! These run on the native notification thread. None of them waits for a consumer:
//! the coarse lock is held only to read or update metadata, and every handoff is a
//! non-blocking send.

use std::sync::Arc;

use log::{debug, info, trace, warn};

use super::central::Central;
use super::connection::{ConnectedEvent, Connection};
use super::error::{Error, NativeError};
use super::native::PeerHandle;
use super::scan;
use super::types::{Advertisement, AdvertisementData};

impl Central {
    /// The central manager's state changed; read it with [Central::state].
    pub fn on_state_changed(&self) {
        self.inner.state_changed.signal(());
    }

    /// A peer's advertisement was received.
    ///
    /// Forwarded to the active scan sink if there is one; dropped if there is none or
    /// the sink is full.
    pub fn on_discover(&self, peer: &dyn PeerHandle, adv_data: AdvertisementData, rssi: i16) {
        let Some(sink) = self.inner.shared.lock_blocking().relay.sink() else {
            return;
        };
        let id = match peer.identifier() {
            Ok(id) => id,
            Err(e) => {
                trace!("dropped advertisement from an unidentifiable peer: {e}");
                return;
            }
        };
        scan::deliver(&sink, Advertisement { id, adv_data, rssi });
    }

    /// A connection attempt completed.
    ///
    /// Posts exactly one connect event. The connection is registered only if it could
    /// be constructed from `peer`.
    pub fn on_connect(&self, peer: Arc<dyn PeerHandle>) {
        let event = match Connection::new(peer) {
            Ok(conn) => {
                let mut shared = self.inner.shared.lock_blocking();
                let replaced = shared.registry.insert(conn.clone());
                let count = shared.registry.len();
                drop(shared);
                debug!("registered connection with {}, {count} in total", conn.id());
                if let Some(stale) = replaced {
                    warn!("replaced a stale connection with {}", stale.id());
                    stale.close(None);
                }
                ConnectedEvent::Connected(conn)
            }
            Err(e) => {
                warn!("failed to set up a connection: {e}");
                ConnectedEvent::Failed(Error::connect_failed(e))
            }
        };
        self.inner.connected.signal(event);
    }

    /// A link terminated, or an attempt that never completed was torn down.
    ///
    /// Unknown peers are ignored; the native layer may report disconnects for
    /// attempts that were never registered.
    pub fn on_disconnect(&self, peer: &dyn PeerHandle, error: Option<NativeError>) {
        let id = match peer.identifier() {
            Ok(id) => id,
            Err(e) => {
                debug!("ignored disconnect of an unidentifiable peer: {e}");
                return;
            }
        };
        let removed = self.inner.shared.lock_blocking().registry.remove(&id);
        let Some(conn) = removed else {
            debug!("ignored disconnect of unregistered peer {id}");
            return;
        };
        match &error {
            Some(e) => info!("disconnected from {id}: {e}"),
            None => info!("disconnected from {id}"),
        }
        conn.close(error.map(Error::from));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{MockManager, MockPeer};
    use crate::types::{DeviceId, ServiceData};
    use crate::Uuid;
    use std::time::Duration;

    fn full_adv_data() -> AdvertisementData {
        AdvertisementData {
            local_name: Some("Thermo".into()),
            manufacturer_data: Some(vec![0x4c, 0x00, 0x02, 0x15]),
            is_connectable: Some(true),
            tx_power_level: Some(-8),
            services: vec![
                Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb),
                Uuid::from_u128(0x0000181a_0000_1000_8000_00805f9b34fb),
            ],
            service_data: vec![
                ServiceData {
                    uuid: Uuid::from_u128(0x0000181a_0000_1000_8000_00805f9b34fb),
                    data: vec![0x01, 0x02],
                },
                ServiceData {
                    uuid: Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb),
                    data: vec![0x64],
                },
            ],
        }
    }

    #[test]
    fn discover_without_session_is_ignored() {
        let central = Central::new(MockManager::new());
        central.on_discover(MockPeer::new("aa:01").as_ref(), full_adv_data(), -50);

        let (tx, rx) = async_channel::bounded(4);
        central.start_scan(tx).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn discover_delivers_every_field() {
        let central = Central::new(MockManager::new());
        let (tx, rx) = async_channel::bounded(4);
        central.start_scan(tx).unwrap();

        central.on_discover(MockPeer::new("AA:01").as_ref(), full_adv_data(), -50);
        let adv = rx.try_recv().unwrap();
        assert_eq!(
            adv,
            Advertisement {
                id: DeviceId::new("aa:01"),
                adv_data: full_adv_data(),
                rssi: -50,
            }
        );
    }

    #[test]
    fn discover_drops_when_sink_is_full() {
        let central = Central::new(MockManager::new());
        let (tx, rx) = async_channel::bounded(1);
        central.start_scan(tx).unwrap();

        for (i, rssi) in [-40, -41, -42].into_iter().enumerate() {
            let peer = MockPeer::new(&format!("aa:0{i}"));
            central.on_discover(peer.as_ref(), Default::default(), rssi);
        }
        assert_eq!(rx.try_recv().unwrap().rssi, -40);
        assert!(rx.try_recv().is_err());

        central.on_discover(MockPeer::new("aa:09").as_ref(), Default::default(), -43);
        assert_eq!(rx.try_recv().unwrap().rssi, -43);
    }

    #[test]
    fn discover_preserves_arrival_order() {
        let central = Central::new(MockManager::new());
        let (tx, rx) = async_channel::bounded(8);
        central.start_scan(tx).unwrap();

        for rssi in -50..-45 {
            central.on_discover(MockPeer::new("aa:01").as_ref(), Default::default(), rssi);
        }
        let got: Vec<i16> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|adv| adv.rssi)
            .collect();
        assert_eq!(got, vec![-50, -49, -48, -47, -46]);
    }

    #[test]
    fn discover_after_stop_never_reaches_old_sink() {
        let central = Central::new(MockManager::new());
        let (tx, rx) = async_channel::bounded(4);
        let session = central.start_scan(tx).unwrap();
        central.stop_scan(&session);

        central.on_discover(MockPeer::new("aa:01").as_ref(), full_adv_data(), -50);
        assert!(rx.try_recv().is_err());

        let (tx_2, rx_2) = async_channel::bounded(4);
        central.start_scan(tx_2).unwrap();
        central.on_discover(MockPeer::new("aa:02").as_ref(), full_adv_data(), -50);
        assert!(rx.try_recv().is_err());
        assert_eq!(rx_2.try_recv().unwrap().id, DeviceId::new("aa:02"));
    }

    #[test]
    fn discover_from_unidentifiable_peer_is_dropped() {
        let central = Central::new(MockManager::new());
        let (tx, rx) = async_channel::bounded(4);
        central.start_scan(tx).unwrap();
        central.on_discover(MockPeer::unavailable().as_ref(), full_adv_data(), -50);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_connect_posts_one_error_and_registers_nothing() {
        let central = Central::new(MockManager::new());
        central.on_connect(MockPeer::unavailable());

        match central.inner.connected.try_take() {
            Some(ConnectedEvent::Failed(err)) => {
                assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
                assert_eq!(err.native(), Some(&NativeError::PeerUnavailable));
            }
            other => panic!("unexpected connect event: {other:?}"),
        }
        assert!(central.inner.connected.try_take().is_none());
        assert!(central.connections().is_empty());
    }

    #[test]
    fn connect_then_disconnect_closes_once() {
        let central = Central::new(MockManager::new());
        let id = DeviceId::new("aa:bb");
        central.on_connect(MockPeer::new("AA:BB"));
        let conn = match central.inner.connected.try_take() {
            Some(ConnectedEvent::Connected(conn)) => conn,
            other => panic!("unexpected connect event: {other:?}"),
        };
        assert_eq!(central.find_connection(&id), Some(conn.clone()));
        assert!(conn.is_connected());

        let conn_2 = conn.clone();
        let waiter = std::thread::spawn(move || conn_2.wait_disconnected_blocking());
        std::thread::sleep(Duration::from_millis(10));
        central.on_disconnect(
            MockPeer::new("aa:bb").as_ref(),
            Some(NativeError::Message("supervision timeout".into())),
        );
        waiter.join().unwrap();

        assert!(central.find_connection(&id).is_none());
        assert!(!conn.is_connected());
        assert!(!conn.close(None));
        assert_eq!(conn.disconnect_reason().unwrap().message(), "supervision timeout");

        // a late duplicate callback changes nothing
        central.on_disconnect(MockPeer::new("aa:bb").as_ref(), None);
        assert_eq!(conn.disconnect_reason().unwrap().message(), "supervision timeout");
    }

    #[test]
    fn disconnect_of_unknown_peer_is_noop() {
        let central = Central::new(MockManager::new());
        central.on_connect(MockPeer::new("aa:01"));
        let conn = central.find_connection(&DeviceId::new("aa:01")).unwrap();

        central.on_disconnect(MockPeer::new("aa:02").as_ref(), None);
        central.on_disconnect(MockPeer::unavailable().as_ref(), None);

        assert_eq!(central.connections(), vec![conn.clone()]);
        assert!(conn.is_connected());
    }

    #[test]
    fn reconnect_closes_replaced_connection() {
        let central = Central::new(MockManager::new());
        central.on_connect(MockPeer::new("aa:01"));
        let old = central.find_connection(&DeviceId::new("aa:01")).unwrap();
        central.on_connect(MockPeer::new("aa:01"));
        let new = central.find_connection(&DeviceId::new("aa:01")).unwrap();

        assert_ne!(old, new);
        assert!(!old.is_connected());
        assert!(old.disconnect_reason().is_none());
        assert!(new.is_connected());
    }

    #[test]
    fn state_changes_coalesce() {
        let central = Central::new(MockManager::new());
        assert!(!central.try_state_changed());
        central.on_state_changed();
        central.on_state_changed();
        assert!(central.try_state_changed());
        assert!(!central.try_state_changed());

        central.on_state_changed();
        assert!(central.wait_state_changed_blocking());
        assert!(!central.try_state_changed());
    }
}
