//! Call marshaling between arbitrary caller threads and the worker context.
//!
//! A single FIFO job queue guarded by a mutex and woken through a condvar;
//! the worker's dispatch loop pops one job at a time and runs it to
//! completion against the widget, so forwarded units of work never
//! interleave and per-caller submission order is preserved.
//!
//! Forwarded work is `FnOnce(&mut W) + Send + 'static`: the bounds force the
//! closure to be fully self-contained, carrying only owned copies of
//! primary-thread state (a snapshotted size, a cloned path) rather than
//! references back into it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::error::{HostError, Result};

/// A unit of work relocated onto the worker context.
pub(crate) type Job<W> = Box<dyn FnOnce(&mut W) + Send + 'static>;

/// How long a blocked `invoke` sleeps between liveness re-checks of the
/// worker loop.
const LIVENESS_RECHECK: Duration = Duration::from_millis(100);

/// FIFO queue feeding the worker's dispatch loop.
pub(crate) struct JobQueue<W> {
    queue: Mutex<VecDeque<Job<W>>>,
    condvar: Condvar,
}

impl<W> JobQueue<W> {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, job: Job<W>) {
        let mut queue = self.queue.lock();
        queue.push_back(job);
        self.condvar.notify_one();
    }

    /// Block until a job is available, then dequeue it.
    pub(crate) fn pop_blocking(&self) -> Job<W> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(job) = queue.pop_front() {
                return job;
            }
            self.condvar.wait(&mut queue);
        }
    }

    /// Like [`pop_blocking`](Self::pop_blocking) but gives up after
    /// `timeout`. Used by dispatch loops that must also pump an OS message
    /// queue between jobs.
    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Option<Job<W>> {
        let mut queue = self.queue.lock();
        if let Some(job) = queue.pop_front() {
            return Some(job);
        }
        self.condvar.wait_for(&mut queue, timeout);
        queue.pop_front()
    }
}

/// The only legal way for any thread other than the worker to touch the
/// widget.
///
/// Cheap to clone; every clone feeds the same dispatch loop.
pub(crate) struct CallProxy<W> {
    queue: Arc<JobQueue<W>>,
    alive: Arc<AtomicBool>,
}

impl<W> Clone for CallProxy<W> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<W: 'static> CallProxy<W> {
    pub(crate) fn new(queue: Arc<JobQueue<W>>, alive: Arc<AtomicBool>) -> Self {
        Self { queue, alive }
    }

    fn worker_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Blocking-forward: enqueue `work`, wait until the worker has executed
    /// it, and return its result.
    ///
    /// Any fault raised inside `work` travels back inside `R` (widget
    /// operations return `Result`); `WorkerGone` means the dispatch loop
    /// died before completing the call.
    pub(crate) fn invoke<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut W) -> R + Send + 'static,
    {
        if !self.worker_alive() {
            return Err(HostError::WorkerGone);
        }

        let slot: Arc<(Mutex<Option<R>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let completion = Arc::clone(&slot);

        self.queue.push(Box::new(move |widget| {
            let value = work(widget);
            let (lock, condvar) = &*completion;
            *lock.lock() = Some(value);
            condvar.notify_one();
        }));

        let (lock, condvar) = &*slot;
        let mut value = lock.lock();
        loop {
            if let Some(result) = value.take() {
                return Ok(result);
            }
            condvar.wait_for(&mut value, LIVENESS_RECHECK);
            if value.is_none() && !self.worker_alive() {
                return Err(HostError::WorkerGone);
            }
        }
    }

    /// Fire-and-forget-forward: enqueue `work` and return immediately.
    pub(crate) fn post<F>(&self, work: F)
    where
        F: FnOnce(&mut W) + Send + 'static,
    {
        if !self.worker_alive() {
            warn!("[Marshal] Dropping posted call: worker is gone");
            return;
        }
        self.queue.push(Box::new(work));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Counter {
        calls: Vec<u32>,
    }

    fn spawn_loop(queue: Arc<JobQueue<Counter>>, alive: Arc<AtomicBool>) {
        thread::spawn(move || {
            let mut widget = Counter { calls: Vec::new() };
            while alive.load(Ordering::Acquire) {
                if let Some(job) = queue.pop_timeout(Duration::from_millis(10)) {
                    job(&mut widget);
                }
            }
        });
    }

    fn proxy_with_loop() -> (CallProxy<Counter>, Arc<AtomicBool>) {
        let queue = Arc::new(JobQueue::new());
        let alive = Arc::new(AtomicBool::new(true));
        spawn_loop(Arc::clone(&queue), Arc::clone(&alive));
        (CallProxy::new(queue, Arc::clone(&alive)), alive)
    }

    #[test]
    fn invoke_returns_value() {
        let (proxy, alive) = proxy_with_loop();
        let n = proxy.invoke(|w| {
            w.calls.push(1);
            41 + 1
        });
        assert_eq!(n.unwrap(), 42);
        alive.store(false, Ordering::Release);
    }

    #[test]
    fn same_caller_order_is_preserved() {
        let (proxy, alive) = proxy_with_loop();
        for i in 0..100u32 {
            proxy.post(move |w| w.calls.push(i));
        }
        let seen = proxy.invoke(|w| w.calls.clone()).unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        alive.store(false, Ordering::Release);
    }

    #[test]
    fn blocking_and_posted_calls_share_one_queue() {
        let (proxy, alive) = proxy_with_loop();
        proxy.post(|w| w.calls.push(1));
        proxy.invoke(|w| w.calls.push(2)).unwrap();
        let seen = proxy.invoke(|w| w.calls.clone()).unwrap();
        assert_eq!(seen, vec![1, 2]);
        alive.store(false, Ordering::Release);
    }

    #[test]
    fn invoke_on_dead_worker_fails() {
        let queue = Arc::new(JobQueue::<Counter>::new());
        let alive = Arc::new(AtomicBool::new(false));
        let proxy = CallProxy::new(queue, alive);
        assert!(matches!(
            proxy.invoke(|_| ()),
            Err(HostError::WorkerGone)
        ));
    }

    #[test]
    fn invoke_notices_worker_dying_mid_wait() {
        let queue = Arc::new(JobQueue::<Counter>::new());
        let alive = Arc::new(AtomicBool::new(true));
        let proxy = CallProxy::new(Arc::clone(&queue), Arc::clone(&alive));

        // No loop is draining the queue; kill the "worker" shortly after
        // the call blocks.
        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            alive.store(false, Ordering::Release);
        });
        assert!(matches!(
            proxy.invoke(|_| ()),
            Err(HostError::WorkerGone)
        ));
        killer.join().unwrap();
    }
}
