//! Embedding/reparenting controller.
//!
//! Grafts the worker-owned widget's window into the primary window's
//! hierarchy and detaches it again. Ordering matters: before any operation
//! that makes the widget do heavy synchronous work, it must be detached
//! first and hidden second — input events queued against a still-attached
//! widget freeze the host window's own input processing.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::error::Result;
use crate::marshal::CallProxy;
use crate::widget::{Point, RichTextWidget, Size, WindowHandle};

/// Sequences attach/detach/resize of the widget window, all through the
/// call marshaling facade.
pub(crate) struct EmbedController<W> {
    proxy: CallProxy<W>,
    /// The host container's handle, captured once at initialization.
    host_handle: WindowHandle,
    attached: AtomicBool,
}

impl<W: RichTextWidget> EmbedController<W> {
    pub(crate) fn new(proxy: CallProxy<W>, host_handle: WindowHandle) -> Self {
        Self {
            proxy,
            host_handle,
            attached: AtomicBool::new(false),
        }
    }

    /// Reparent the widget under the host window, position it at the host's
    /// origin and size it to `size` (a snapshot taken on the primary
    /// thread — never re-read live from worker code).
    ///
    /// Idempotent: attaching an attached widget re-applies the same parent.
    pub(crate) fn attach(&self, size: Size) -> Result<()> {
        let handle = self.host_handle;
        self.proxy.invoke(move |widget| {
            widget.set_parent(Some(handle));
            widget.set_position(Point::ORIGIN);
            widget.set_size(size);
        })?;
        self.attached.store(true, Ordering::Release);
        debug!("[Embed] Attached under {handle:?} at {size:?}");
        Ok(())
    }

    /// Clear the widget's parent (parent = none). Idempotent.
    pub(crate) fn detach(&self) -> Result<()> {
        self.proxy.invoke(|widget| widget.set_parent(None))?;
        self.attached.store(false, Ordering::Release);
        debug!("[Embed] Detached");
        Ok(())
    }

    /// Forward a size-set with a snapshotted size value. Fire-and-forget,
    /// like every host-resize notification.
    pub(crate) fn resize(&self, size: Size) {
        self.proxy.post(move |widget| widget.set_size(size));
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}
