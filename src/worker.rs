//! The worker execution context: a dedicated thread that owns the native
//! widget and its dispatch loop for the remainder of the process.
//!
//! Startup sequence on the spawned thread:
//! 1. construct the widget via the caller-supplied factory,
//! 2. force its initial transient state (read-only, default background,
//!    hidden, detached),
//! 3. install the focus/tab relay's event sink,
//! 4. fire the readiness signal — from a drop guard, so it also fires when
//!    construction fails, otherwise the primary thread deadlocks in `wait`,
//! 5. enter the dispatch loop, which never returns on the success path.
//!
//! The thread is never joined; it is reclaimed at process exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info};
use parking_lot::Mutex;

use crate::constants::{PUMP_POLL_INTERVAL, WORKER_THREAD_NAME};
use crate::error::{HostError, Result, WidgetError};
use crate::marshal::{CallProxy, JobQueue};
use crate::signal::{ReadySignal, SignalOnDrop};
use crate::widget::{Color, EventSink, RichTextWidget};

/// Clears the worker-alive flag when the thread exits, unwinding included,
/// so blocked `invoke` callers fail with `WorkerGone` instead of hanging.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawn the dedicated worker thread and return the proxy feeding it.
///
/// Blocks nowhere itself; the caller is expected to `wait()` on `ready`
/// immediately afterwards and then check `startup_error`.
pub(crate) fn spawn<W, F>(
    factory: F,
    sink: EventSink,
    ready: Arc<ReadySignal>,
    startup_error: Arc<Mutex<Option<WidgetError>>>,
) -> Result<CallProxy<W>>
where
    W: RichTextWidget,
    F: FnOnce() -> Result<W, WidgetError> + Send + 'static,
{
    let queue = Arc::new(JobQueue::new());
    let alive = Arc::new(AtomicBool::new(true));
    let proxy = CallProxy::new(Arc::clone(&queue), Arc::clone(&alive));

    thread::Builder::new()
        .name(WORKER_THREAD_NAME.into())
        .spawn(move || {
            let _alive = AliveGuard(alive);

            let widget = {
                // Signal fires when this guard drops, success or not.
                let _ready = SignalOnDrop(ready);
                match factory() {
                    Ok(mut widget) => {
                        // Initial transient state: protected, default
                        // background, invisible and detached until the
                        // embedding controller grafts it in.
                        widget.set_read_only(true);
                        widget.set_back_color(Color::WINDOW);
                        widget.set_visible(false);
                        widget.set_parent(None);
                        widget.set_event_sink(sink);
                        debug!("[Worker] Widget constructed");
                        Some(widget)
                    }
                    Err(e) => {
                        error!("[Worker] Widget construction failed: {e}");
                        *startup_error.lock() = Some(e);
                        None
                    }
                }
            };

            let Some(mut widget) = widget else {
                return;
            };

            info!("[Worker] Entering dispatch loop");
            run_dispatch_loop(&mut widget, &queue);
        })
        .map_err(HostError::WorkerSpawn)?;

    Ok(proxy)
}

/// The worker context's event-dispatch loop. Executes one forwarded unit
/// of work to completion before the next; never returns.
fn run_dispatch_loop<W: RichTextWidget>(widget: &mut W, queue: &JobQueue<W>) -> ! {
    if widget.needs_pump() {
        // Hybrid loop: serve jobs and pump the widget's OS message queue
        // in turns, so its input handlers stay responsive no matter what
        // the primary thread is doing.
        loop {
            if let Some(job) = queue.pop_timeout(PUMP_POLL_INTERVAL) {
                job(widget);
            }
            widget.pump_os_events();
        }
    } else {
        loop {
            let job = queue.pop_blocking();
            job(widget);
        }
    }
}
