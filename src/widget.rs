//! The native rich-text widget collaborator boundary.
//!
//! The engine consumes the widget as an opaque capability: construct it,
//! read/write its properties, load content into it, and receive its raw
//! input notifications. Everything behind [`RichTextWidget`] is assumed to
//! be thread-affine — created, read, and mutated only on the thread that
//! constructed it — which is why the trait is deliberately **not** `Send`:
//! instances never leave the worker thread, and the compiler enforces it.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::WidgetError;

/// An opaque OS window identifier.
///
/// Handles are plain integers and may be copied freely across threads; the
/// window behind one may only be touched from its owning thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// A width/height pair, snapshotted as a value before crossing threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// A position in host-window client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };
}

/// An opaque RGB color forwarded to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// The platform default text-window background.
    pub const WINDOW: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Border drawn around the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    None,
    FixedSingle,
    #[default]
    Fixed3D,
}

/// Which scrollbars the widget shows when content overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBars {
    None,
    Horizontal,
    Vertical,
    #[default]
    Both,
}

/// Format hint for a load call: how the widget should interpret the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Rich-text markup, OLE objects included.
    RichText,
    /// Plain text in the system encoding.
    PlainText,
    /// Rich-text markup with OLE objects dropped.
    RichNoOle,
    /// Plain text with textual OLE placeholders.
    TextTextOle,
    /// Plain text, UTF-16.
    UnicodePlainText,
}

/// A raw input notification raised by the widget on the worker thread.
///
/// Events carry the widget's visibility at raise time so the relay can
/// decide without another cross-thread read.
#[derive(Debug, Clone, Copy)]
pub enum WidgetEvent {
    /// Pointer pressed inside the widget.
    PointerPressed { visible: bool },
    /// Tab key pressed inside the widget. Backends raise this only while
    /// tab-insertion into the text is disabled.
    TabPressed { visible: bool, shift: bool },
}

/// Receiver for [`WidgetEvent`]s, installed once during worker startup.
pub type EventSink = Arc<dyn Fn(WidgetEvent) + Send + Sync>;

/// The native rich-text widget, as consumed by the hosting engine.
///
/// Implementations wrap a real OS control (`win32::Win32RichEdit` on
/// Windows) or an in-memory fake for tests. All methods are called
/// exclusively on the worker thread; the `'static` bound without `Send`
/// encodes that the value is constructed there and never moves.
pub trait RichTextWidget: 'static {
    // ── Proxied properties ───────────────────────────────────────────────

    fn back_color(&self) -> Color;
    fn set_back_color(&mut self, color: Color);

    fn fore_color(&self) -> Color;
    fn set_fore_color(&mut self, color: Color);

    fn border_style(&self) -> BorderStyle;
    fn set_border_style(&mut self, style: BorderStyle);

    fn read_only(&self) -> bool;
    fn set_read_only(&mut self, read_only: bool);

    fn multiline(&self) -> bool;
    fn set_multiline(&mut self, multiline: bool);

    /// Whether the tab key inserts a tab character instead of traversing
    /// focus. While enabled, backends must not raise
    /// [`WidgetEvent::TabPressed`].
    fn accepts_tab(&self) -> bool;
    fn set_accepts_tab(&mut self, accepts_tab: bool);

    fn max_length(&self) -> u32;
    fn set_max_length(&mut self, max_length: u32);

    fn scrollbars(&self) -> ScrollBars;
    fn set_scrollbars(&mut self, scrollbars: ScrollBars);

    fn detect_urls(&self) -> bool;
    fn set_detect_urls(&mut self, detect: bool);

    /// The whole document as plain text.
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);

    /// The whole document as rich-text markup.
    fn rich_text(&self) -> String;
    fn set_rich_text(&mut self, markup: &str);

    /// The document split into lines.
    fn lines(&self) -> Vec<String>;

    // ── Content loading ──────────────────────────────────────────────────

    /// Load content from `path`, inferring the format. Blocks the calling
    /// (worker) thread for the duration of the load.
    fn load_file(&mut self, path: &Path) -> Result<(), WidgetError>;

    fn load_file_with(&mut self, path: &Path, kind: StreamKind) -> Result<(), WidgetError>;

    fn load_stream(&mut self, data: &mut dyn Read, kind: StreamKind) -> Result<(), WidgetError>;

    // ── Window plumbing ──────────────────────────────────────────────────

    /// Claim keyboard focus inside the worker context's input system.
    fn focus(&mut self);

    fn visible(&self) -> bool;
    fn set_visible(&mut self, visible: bool);

    fn parent(&self) -> Option<WindowHandle>;

    /// Reparent the widget's window under `parent`, or detach it entirely
    /// with `None`.
    fn set_parent(&mut self, parent: Option<WindowHandle>);

    fn set_position(&mut self, position: Point);
    fn set_size(&mut self, size: Size);

    /// Install the receiver for raw input notifications. Called once,
    /// during worker startup, before the dispatch loop begins.
    fn set_event_sink(&mut self, sink: EventSink);

    // ── Dispatch loop integration ────────────────────────────────────────

    /// Whether the widget owns an OS message queue that must be pumped
    /// between forwarded jobs. An in-memory widget does not; a real
    /// windowed control does.
    fn needs_pump(&self) -> bool {
        false
    }

    /// Drain the widget's pending OS input events. The worker's dispatch
    /// loop calls this between forwarded jobs when
    /// [`needs_pump`](Self::needs_pump) reports true.
    fn pump_os_events(&mut self) {}
}
