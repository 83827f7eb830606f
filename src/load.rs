//! The load orchestrator: the state machine around "load content into the
//! widget".
//!
//! Per call: `Idle → Detaching → Loading → Restoring → Idle`. The widget is
//! popped off the host window first and hidden second — in that order —
//! before the load, because input events queued against a still-attached
//! widget freeze the host's own input processing while the widget blocks.
//! Restoring always runs, load fault or not, so the widget never ends up
//! detached, hidden, or wrongly writable; content faults surface to the
//! caller only after Restoring completes.
//!
//! The synchronous family blocks the calling thread for the whole machine
//! and suits callers already on a background thread. The asynchronous
//! family runs the identical body on a short-lived background thread and
//! hands back a [`LoadTask`] the primary thread can await — or block on —
//! without stalling its own dispatch loop.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::constants::LOAD_THREAD_NAME;
use crate::embed::EmbedController;
use crate::error::{HostError, Result, WidgetError};
use crate::host::RichTextHost;
use crate::marshal::CallProxy;
use crate::widget::{RichTextWidget, StreamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Detaching,
    Loading,
    Restoring,
}

impl<W: RichTextWidget> RichTextHost<W> {
    // ── Synchronous family ───────────────────────────────────────────────

    /// Load content from `path`, letting the widget infer the format.
    ///
    /// Blocks the calling thread until the widget finishes; the primary
    /// thread should prefer [`load_file_async`](Self::load_file_async).
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_owned();
        self.run_load(move |w| w.load_file(&path))
    }

    /// Load content from `path` with an explicit format hint.
    pub fn load_file_with(&self, path: impl AsRef<Path>, kind: StreamKind) -> Result<()> {
        let path = path.as_ref().to_owned();
        self.run_load(move |w| w.load_file_with(&path, kind))
    }

    /// Load content from a byte stream with an explicit format hint.
    pub fn load_stream(
        &self,
        data: impl std::io::Read + Send + 'static,
        kind: StreamKind,
    ) -> Result<()> {
        let mut data = data;
        self.run_load(move |w| w.load_stream(&mut data, kind))
    }

    // ── Asynchronous family ──────────────────────────────────────────────

    /// Like [`load_file`](Self::load_file), but runs the state machine on a
    /// background thread.
    pub fn load_file_async(&self, path: impl AsRef<Path>) -> LoadTask {
        let path = path.as_ref().to_owned();
        self.spawn_load(move |host| host.load_file(path))
    }

    /// Like [`load_file_with`](Self::load_file_with), on a background
    /// thread.
    pub fn load_file_with_async(&self, path: impl AsRef<Path>, kind: StreamKind) -> LoadTask {
        let path = path.as_ref().to_owned();
        self.spawn_load(move |host| host.load_file_with(path, kind))
    }

    /// Like [`load_stream`](Self::load_stream), on a background thread.
    pub fn load_stream_async(
        &self,
        data: impl std::io::Read + Send + 'static,
        kind: StreamKind,
    ) -> LoadTask {
        self.spawn_load(move |host| host.load_stream(data, kind))
    }

    // ── State machine ────────────────────────────────────────────────────

    fn run_load(
        &self,
        op: impl FnOnce(&mut W) -> Result<(), WidgetError> + Send + 'static,
    ) -> Result<()> {
        let proxy = self.inner.proxy()?;
        let embed = self.inner.embed()?;

        // Snapshot before Detaching; restored verbatim in Restoring.
        let was_read_only = proxy.invoke(|w| w.read_only())?;

        let loaded = match self.load_start(&proxy, &embed, was_read_only) {
            Ok(()) => {
                debug!("[Load] {:?}", LoadPhase::Loading);
                match proxy.invoke(op) {
                    Ok(widget_result) => widget_result.map_err(HostError::from),
                    Err(marshal_fault) => Err(marshal_fault),
                }
            }
            Err(e) => Err(e),
        };

        let restored = self.load_end(&proxy, &embed, was_read_only);

        // The content fault, if any, wins — but only now, with the widget
        // attached, visible, and its read-only flag restored.
        loaded?;
        restored
    }

    fn load_start(
        &self,
        proxy: &CallProxy<W>,
        embed: &EmbedController<W>,
        was_read_only: bool,
    ) -> Result<()> {
        debug!("[Load] {:?}", LoadPhase::Detaching);
        if was_read_only {
            proxy.invoke(|w| w.set_read_only(false))?;
        }
        // Detach first, hide second. The reverse order is the documented
        // input-freeze defect.
        embed.detach()?;
        proxy.invoke(|w| w.set_visible(false))?;
        Ok(())
    }

    fn load_end(
        &self,
        proxy: &CallProxy<W>,
        embed: &EmbedController<W>,
        was_read_only: bool,
    ) -> Result<()> {
        debug!("[Load] {:?}", LoadPhase::Restoring);
        if was_read_only {
            proxy.invoke(|w| w.set_read_only(true))?;
        }
        // Resync uses the host's size as of now, not a snapshot from
        // before the load; the host may have been resized mid-load.
        let size = self.inner.host.client_size();
        embed.attach(size)?;
        proxy.invoke(|w| w.set_visible(true))?;
        embed.resize(size);
        if self.inner.host.focuser_focused() {
            proxy.post(|w| w.focus());
        }
        Ok(())
    }

    fn spawn_load(
        &self,
        body: impl FnOnce(&RichTextHost<W>) -> Result<()> + Send + 'static,
    ) -> LoadTask {
        let shared = Arc::new(TaskShared::default());
        let completion = Arc::clone(&shared);
        let host = self.clone();

        let spawned = thread::Builder::new()
            .name(LOAD_THREAD_NAME.into())
            .spawn(move || completion.complete(body(&host)));
        if let Err(e) = spawned {
            warn!("[Load] Could not spawn load thread: {e}");
            shared.complete(Err(HostError::WorkerSpawn(e)));
        }

        LoadTask { shared }
    }
}

#[derive(Default)]
struct TaskState {
    result: Option<Result<()>>,
    waker: Option<Waker>,
}

#[derive(Default)]
struct TaskShared {
    state: Mutex<TaskState>,
    condvar: Condvar,
}

impl TaskShared {
    fn complete(&self, result: Result<()>) {
        let waker = {
            let mut state = self.state.lock();
            state.result = Some(result);
            self.condvar.notify_all();
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Handle to an in-flight asynchronous load.
///
/// Consume it either by blocking ([`wait`](Self::wait)) or by awaiting it
/// as a `Future`. There is no cancellation: once submitted, the load runs
/// to completion on the worker context.
pub struct LoadTask {
    shared: Arc<TaskShared>,
}

impl LoadTask {
    /// Block the calling thread until the load completes and return its
    /// outcome.
    pub fn wait(self) -> Result<()> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(result) = state.result.take() {
                return result;
            }
            self.shared.condvar.wait(&mut state);
        }
    }

    /// Whether the load has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().result.is_some()
    }
}

impl Future for LoadTask {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match state.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
