//! Cross-thread hosting for a blocking, thread-affine rich-text widget.
//!
//! The native widget can only be created, read, and mutated on the thread
//! that constructed it, and its file loads block that thread for the whole
//! load. This crate lets a primary UI embed and drive such a widget without
//! ever blocking the primary thread:
//!
//! - a dedicated worker thread runs the widget's own event-dispatch loop;
//! - every property read/write and method call crosses the thread boundary
//!   through a blocking-or-fire-and-forget call-forwarding facade
//!   ([`RichTextHost`]);
//! - the widget's window is grafted into the primary window hierarchy by
//!   low-level handle reparenting, and detached again around heavy loads;
//! - keyboard focus and tab order are relayed between the two independent
//!   input loops so the composite behaves like one widget ([`HostWindow`]).
//!
//! The widget itself is consumed as an opaque capability behind
//! [`RichTextWidget`]; on Windows, `win32::Win32RichEdit` wraps the real
//! rich-edit control.

// The engine is safe Rust; only the Win32 backend opts back in.
#![deny(unsafe_code)]

mod constants;
mod embed;
mod error;
mod host;
mod load;
mod marshal;
mod relay;
mod signal;
mod widget;
mod worker;

#[cfg(windows)]
pub mod win32;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{HostError, Result, WidgetError};
pub use host::{HostMode, RichTextHost};
pub use load::LoadTask;
pub use relay::{HostWindow, UiJob};
pub use widget::{
    BorderStyle, Color, EventSink, Point, RichTextWidget, ScrollBars, Size, StreamKind,
    WidgetEvent, WindowHandle,
};

use std::sync::Once;

use env_logger::{Builder, Env};
use log::LevelFilter;

// Re-initializing the logger when two hosts are created in one process is
// an error, so it is guarded and only ever runs once.
static LOGGER_INIT: Once = Once::new();

/// Convenience logger setup for demos and tests; embedding applications
/// with their own logging should skip this.
pub fn init_logging() {
    LOGGER_INIT.call_once(|| {
        Builder::from_env(Env::default().default_filter_or("info"))
            .filter(None, LevelFilter::Info)
            .init();
    });
}
