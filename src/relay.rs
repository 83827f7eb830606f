//! Focus/tab relay protocol between the two input loops.
//!
//! The worker context runs its own input-focus system, so the composite
//! control has two: the primary window's and the widget's. This module
//! relays notifications in the worker → primary direction so the pair
//! behaves like a single tab stop:
//!
//! - pointer press inside the visible widget → the facade claims focus in
//!   the primary system (with re-entry suppressed, or the facade — an empty
//!   container — would immediately bounce focus back into the widget and
//!   ping-pong forever);
//! - tab press inside the visible widget → the primary window advances
//!   focus to the facade's neighbor, honoring shift for reverse order. The
//!   query must be addressed to the top-level window; sibling lookup fails
//!   on the immediate container.
//!
//! Both relays are delivered fire-and-forget onto the primary dispatch loop
//! via [`HostWindow::post_to_ui`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::widget::{EventSink, Size, WidgetEvent, WindowHandle};

/// A unit of work relocated onto the primary UI thread.
pub type UiJob = Box<dyn FnOnce() + Send>;

/// The embedding UI, as consumed by the hosting engine.
///
/// This is the outbound boundary: the engine never touches the primary
/// window's widgets directly, it only asks the embedder to act. All methods
/// except [`post_to_ui`](Self::post_to_ui) are called on the primary thread;
/// `post_to_ui` is called from the worker thread and must marshal the job
/// onto the primary dispatch loop.
///
/// Implementations must keep a hidden, always-present, empty focusable
/// element inside the facade's container (the "focuser"): the real widget is
/// not enumerable as a local child for focus purposes, and the primary focus
/// system needs at least one local target to hand focus to.
pub trait HostWindow: Send + Sync + 'static {
    /// The host container's window handle. Read once during initialization
    /// and never re-read from worker code.
    fn window_handle(&self) -> WindowHandle;

    /// Current size of the facade's container, read on the primary thread.
    fn client_size(&self) -> Size;

    /// Whether the facade currently holds input focus in the primary
    /// window's focus system.
    fn has_focus(&self) -> bool;

    /// Whether the hidden focuser element specifically holds focus.
    fn focuser_focused(&self) -> bool;

    /// Give primary-system focus to the facade's container.
    fn claim_focus(&self);

    /// Advance primary-system focus to the control after (or, with
    /// `forward == false`, before) the facade. Addressed to the top-level
    /// window containing the facade.
    fn advance_focus(&self, forward: bool);

    /// Enqueue `job` onto the primary thread's dispatch loop. Called from
    /// the worker thread.
    fn post_to_ui(&self, job: UiJob);
}

/// Shared relay state: the documented re-entrancy guard.
///
/// While a worker-initiated focus claim runs, the facade's own
/// entered-notification is suppressed so the claim cannot re-trigger a
/// forwarded focus call into the widget it originated from.
pub(crate) struct RelayShared {
    events_enabled: AtomicBool,
}

impl RelayShared {
    pub(crate) fn new() -> Self {
        Self {
            events_enabled: AtomicBool::new(true),
        }
    }

    pub(crate) fn events_enabled(&self) -> bool {
        self.events_enabled.load(Ordering::Acquire)
    }

    fn run_suppressed(&self, f: impl FnOnce()) {
        self.events_enabled.store(false, Ordering::Release);
        f();
        self.events_enabled.store(true, Ordering::Release);
    }
}

/// Claim primary focus for the facade on behalf of the widget.
///
/// Runs on the primary thread. No-op when the focuser already holds focus,
/// so back-to-back relays cannot double-fire.
pub(crate) fn select_this(host: &dyn HostWindow, relay: &RelayShared) {
    if host.focuser_focused() {
        return;
    }
    relay.run_suppressed(|| host.claim_focus());
}

/// Build the event sink installed into the widget during worker startup.
pub(crate) fn make_sink(host: Arc<dyn HostWindow>, relay: Arc<RelayShared>) -> EventSink {
    Arc::new(move |event| match event {
        WidgetEvent::PointerPressed { visible: true } => {
            trace!("[Relay] Pointer press → focus claim");
            let host_job = Arc::clone(&host);
            let relay_job = Arc::clone(&relay);
            host.post_to_ui(Box::new(move || select_this(&*host_job, &relay_job)));
        }
        WidgetEvent::TabPressed {
            visible: true,
            shift,
        } => {
            trace!("[Relay] Tab press (shift={shift}) → advance focus");
            let host_job = Arc::clone(&host);
            host.post_to_ui(Box::new(move || host_job.advance_focus(!shift)));
        }
        // Hidden widget: nothing visible to hand focus to or from.
        WidgetEvent::PointerPressed { visible: false }
        | WidgetEvent::TabPressed { visible: false, .. } => {}
    })
}
