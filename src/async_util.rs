use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use futures_lite::FutureExt;
use futures_timer::Delay;

/// Single-slot, last-write-wins notification from "foreign" callbacks.
///
/// Signaling never blocks: a value that has not been taken yet is replaced by the
/// newer one, so a slow consumer observes at most one pending value.
pub struct Latch<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> Latch<T> {
    /// Creates an empty latch.
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        Self { sender, receiver }
    }

    /// Posts `value` from the callback side. Returns `true` if an unconsumed value
    /// was overwritten.
    pub fn signal(&self, value: T) -> bool {
        matches!(self.sender.force_send(value), Ok(Some(_)))
    }

    /// Takes the pending value if there is one.
    pub fn try_take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Waits until a value is posted and takes it.
    ///
    /// The latch owns both channel ends, so `None` is only possible while it is
    /// being torn down.
    pub async fn wait(&self) -> Option<T> {
        self.receiver.recv().await.ok()
    }

    /// Blocking version of [Latch::wait] for synchronous callers.
    pub fn wait_blocking(&self) -> Option<T> {
        self.receiver.recv_blocking().ok()
    }
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// One-shot signal that may be closed any number of times; only the first close
/// takes effect and stores its value.
///
/// Goes `Open -> Closing -> Closed`. Waiters are woken once the state reaches
/// `Closed`, at which point the stored value is readable.
pub struct CompletionSignal<T> {
    state: AtomicU8,
    value: OnceLock<T>,
    // nothing is ever sent; closing the channel wakes every waiter.
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl<T> CompletionSignal<T> {
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        Self {
            state: AtomicU8::new(OPEN),
            value: OnceLock::new(),
            sender,
            receiver,
        }
    }

    /// Closes the signal with `value`. Returns `false` (and drops `value`) if the
    /// signal was already closed or is being closed by another thread.
    pub fn close(&self, value: T) -> bool {
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _ = self.value.set(value);
        self.state.store(CLOSED, Ordering::Release);
        self.sender.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    /// The value stored by the winning `close`, once closed.
    pub fn value(&self) -> Option<&T> {
        if self.is_closed() {
            self.value.get()
        } else {
            None
        }
    }

    /// Waits until the signal is closed.
    pub async fn wait(&self) {
        while self.receiver.recv().await.is_ok() {}
    }

    /// Blocking version of [CompletionSignal::wait].
    pub fn wait_blocking(&self) {
        while self.receiver.recv_blocking().is_ok() {}
    }
}

impl<T> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `fut` to completion, or gives up with `None` after `limit` if one is given.
pub async fn with_timeout<T>(limit: Option<Duration>, fut: impl Future<Output = T>) -> Option<T> {
    let Some(limit) = limit else {
        return Some(fut.await);
    };
    async { Some(fut.await) }
        .or(async {
            Delay::new(limit).await;
            None
        })
        .await
}
