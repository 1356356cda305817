use std::pin::Pin;
use std::task;

use async_channel::{Receiver, Sender, TrySendError};
use futures_core::Stream;
use log::{debug, trace};

use super::central::Central;
use super::error::ErrorKind;
use super::types::Advertisement;
use super::Result;

/// Handle of a registered scan session, returned by [Central::start_scan].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanSession {
    id: u64,
}

/// Registration of the single active scan sink.
///
/// Not synchronized by itself: it lives behind the coarse lock of [Central], and
/// only the sink handle is read while holding that lock. The payload handoff is
/// done afterwards by [deliver].
pub(crate) struct ScanRelay {
    active: Option<ActiveScan>,
    next_id: u64,
}

struct ActiveScan {
    session: ScanSession,
    sink: Sender<Advertisement>,
}

impl ScanRelay {
    pub fn new() -> Self {
        Self {
            active: None,
            next_id: 0,
        }
    }

    /// Registers `sink` as the destination of discovered advertisements.
    pub fn register(&mut self, sink: Sender<Advertisement>) -> Result<ScanSession> {
        if self.active.is_some() {
            return Err(ErrorKind::AlreadyScanning.into());
        }
        self.next_id += 1;
        let session = ScanSession { id: self.next_id };
        self.active.replace(ActiveScan {
            session: session.clone(),
            sink,
        });
        debug!("registered scan session {}", session.id);
        Ok(session)
    }

    /// Unregisters the sink if `session` is the active one. Returns `false` for a
    /// stale or repeated stop.
    pub fn unregister(&mut self, session: &ScanSession) -> bool {
        match self.active.as_ref() {
            Some(active) if &active.session == session => {
                let _ = self.active.take();
                debug!("unregistered scan session {}", session.id);
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Clones the active sink handle.
    pub fn sink(&self) -> Option<Sender<Advertisement>> {
        self.active.as_ref().map(|active| active.sink.clone())
    }
}

/// Hands `adv` to `sink` without waiting; the record is dropped if the sink is full
/// or its receiving side is gone. Returns `true` if it was delivered.
pub(crate) fn deliver(sink: &Sender<Advertisement>, adv: Advertisement) -> bool {
    match sink.try_send(adv) {
        Ok(()) => true,
        Err(TrySendError::Full(adv)) => {
            trace!("scan sink is full, dropped advertisement from {}", adv.id);
            false
        }
        Err(TrySendError::Closed(adv)) => {
            trace!("scan sink is closed, dropped advertisement from {}", adv.id);
            false
        }
    }
}

/// Stream of advertisements of a scan session owned by the stream itself.
///
/// The session is stopped when the stream is dropped.
pub struct ScanStream {
    central: Central,
    session: ScanSession,
    receiver: Pin<Box<Receiver<Advertisement>>>,
}

impl ScanStream {
    pub(crate) fn new(
        central: Central,
        session: ScanSession,
        receiver: Receiver<Advertisement>,
    ) -> Self {
        Self {
            central,
            session,
            receiver: Box::pin(receiver),
        }
    }

    /// The session backing this stream.
    pub fn session(&self) -> &ScanSession {
        &self.session
    }
}

impl Stream for ScanStream {
    type Item = Advertisement;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Advertisement>> {
        self.receiver.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.receiver.len(), None)
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        self.central.stop_scan(&self.session);
    }
}
