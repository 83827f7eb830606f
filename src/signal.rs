//! One-shot readiness handshake between the primary thread and the worker.
//!
//! The primary thread blocks on [`ReadySignal::wait`] immediately after
//! spawning the worker; the worker fires [`ReadySignal::signal`] as the last
//! step of widget construction. Single-permit semantics: at most one
//! outstanding wait, auto-reset on wakeup, no queuing.

use parking_lot::{Condvar, Mutex};

/// Binary, auto-resetting synchronization primitive used once per host
/// lifetime.
#[derive(Debug, Default)]
pub(crate) struct ReadySignal {
    ready: Mutex<bool>,
    condvar: Condvar,
}

impl ReadySignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark the signal as ready and wake the waiter. Idempotent within one
    /// wait cycle: signaling twice before a wait releases a single wait.
    pub(crate) fn signal(&self) {
        let mut ready = self.ready.lock();
        *ready = true;
        self.condvar.notify_one();
    }

    /// Block until a pending [`signal`](Self::signal), then reset to
    /// unsignaled.
    pub(crate) fn wait(&self) {
        let mut ready = self.ready.lock();
        while !*ready {
            self.condvar.wait(&mut ready);
        }
        *ready = false;
    }
}

/// Fires the wrapped signal when dropped.
///
/// The worker holds one of these across widget construction so the signal
/// fires even when the constructor errors or panics; otherwise the primary
/// thread would deadlock in `wait`.
pub(crate) struct SignalOnDrop(pub(crate) std::sync::Arc<ReadySignal>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal();
    }
}
