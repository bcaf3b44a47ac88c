//! Consumer hand-off for resolved bundles.
//!
//! Push mode forwards into a bounded `async-channel` queue and drops the
//! newest bundle when it is full, so producers never block on a slow consumer.
//! Pull mode keeps every resolved bundle in a ready queue guarded by a mutex
//! until a consumer takes it, and parks idle consumers on a condition variable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::SyncedBundle;
use parking_lot::{Condvar, Mutex};

/// Receiving end of the push-mode output queue
pub type BundleReceiver<M> = Receiver<SyncedBundle<M>>;

/// Result of polling the ready queue
pub(crate) enum Pop<M> {
    Ready(SyncedBundle<M>),
    Empty,
    Closed,
}

/// Outcome of handing a bundle to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handoff {
    Accepted,
    /// Push queue at capacity
    Full,
    Closed,
}

pub(crate) enum Delivery<M> {
    Push {
        tx: Sender<SyncedBundle<M>>,
        rx: BundleReceiver<M>,
    },
    Pull(ReadyQueue<M>),
}

impl<M> Delivery<M> {
    pub fn push(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity);
        Self::Push { tx, rx }
    }

    pub fn pull() -> Self {
        Self::Pull(ReadyQueue::new())
    }

    pub fn send(&self, bundle: SyncedBundle<M>) -> Handoff {
        match self {
            Self::Push { tx, .. } => match tx.try_send(bundle) {
                Ok(()) => Handoff::Accepted,
                Err(TrySendError::Full(_)) => Handoff::Full,
                Err(TrySendError::Closed(_)) => Handoff::Closed,
            },
            Self::Pull(ready) => ready.push(bundle),
        }
    }

    pub fn receiver(&self) -> Option<BundleReceiver<M>> {
        match self {
            Self::Push { rx, .. } => Some(rx.clone()),
            Self::Pull(_) => None,
        }
    }

    pub fn ready_queue(&self) -> Option<&ReadyQueue<M>> {
        match self {
            Self::Push { .. } => None,
            Self::Pull(ready) => Some(ready),
        }
    }

    /// Bundles resolved but not yet taken by a consumer
    pub fn pending(&self) -> usize {
        match self {
            Self::Push { tx, .. } => tx.len(),
            Self::Pull(ready) => ready.len(),
        }
    }

    pub fn close(&self) {
        match self {
            Self::Push { tx, .. } => {
                tx.close();
            }
            Self::Pull(ready) => ready.close(),
        }
    }
}

struct ReadyState<M> {
    bundles: VecDeque<SyncedBundle<M>>,
    closed: bool,
}

/// FIFO of resolved bundles with parked consumers.
///
/// Unbounded: a bundle leaves only through a consumer or `close`.
pub(crate) struct ReadyQueue<M> {
    state: Mutex<ReadyState<M>>,
    available: Condvar,
    /// Consumers currently parked in `wait`
    waiting: AtomicUsize,
}

impl<M> ReadyQueue<M> {
    fn new() -> Self {
        Self {
            state: Mutex::new(ReadyState {
                bundles: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            waiting: AtomicUsize::new(0),
        }
    }

    fn push(&self, bundle: SyncedBundle<M>) -> Handoff {
        let mut state = self.state.lock();
        if state.closed {
            return Handoff::Closed;
        }
        state.bundles.push_back(bundle);
        drop(state);

        if self.waiting.load(Ordering::Acquire) > 0 {
            self.available.notify_all();
        }
        Handoff::Accepted
    }

    /// Take the next bundle without blocking
    pub fn try_pop(&self) -> Pop<M> {
        let mut state = self.state.lock();
        if state.closed {
            return Pop::Closed;
        }
        match state.bundles.pop_front() {
            Some(bundle) => Pop::Ready(bundle),
            None => Pop::Empty,
        }
    }

    /// Park until a bundle is pushed, the queue closes or `timeout` elapses.
    ///
    /// Returns immediately if a bundle is already available. Callers must
    /// re-check the queue afterwards; wakeups may be spurious.
    pub fn wait(&self, timeout: Option<Duration>) {
        let mut state = self.state.lock();
        if state.closed || !state.bundles.is_empty() {
            return;
        }

        self.waiting.fetch_add(1, Ordering::AcqRel);
        match timeout {
            Some(timeout) => {
                let _ = self.available.wait_for(&mut state, timeout);
            }
            None => self.available.wait(&mut state),
        }
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.lock().bundles.len()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.bundles.clear();
        drop(state);
        self.available.notify_all();
    }
}
