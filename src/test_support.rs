//! In-memory doubles for the two external collaborators: the thread-affine
//! native widget and the embedding host UI.
//!
//! `FakeWidget` asserts thread affinity on every call — any touch from a
//! thread other than the one that constructed it fails the test, which is
//! exactly the defect the marshaling facade exists to prevent.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::WidgetError;
use crate::marshal::CallProxy;
use crate::relay::{HostWindow, UiJob};
use crate::signal::ReadySignal;
use crate::widget::{
    BorderStyle, Color, EventSink, Point, RichTextWidget, ScrollBars, Size, StreamKind,
    WidgetEvent, WindowHandle,
};
use crate::worker;

/// Lifecycle-relevant widget calls, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WidgetCall {
    SetReadOnly(bool),
    SetVisible(bool),
    SetParent(Option<WindowHandle>),
    SetPosition(Point),
    SetSize(Size),
    LoadFile(PathBuf),
    LoadFileWith(PathBuf, StreamKind),
    LoadStream(StreamKind),
    Focus,
}

/// Observable widget state, mirrored out of the worker thread after every
/// mutation so tests can read it without a forwarded call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub read_only: bool,
    pub visible: bool,
    pub parent: Option<WindowHandle>,
    pub position: Point,
    pub size: Size,
    pub text: String,
    pub focus_count: usize,
}

#[derive(Default)]
struct FakeState {
    calls: Mutex<Vec<WidgetCall>>,
    files: Mutex<HashMap<PathBuf, String>>,
    load_delay: Mutex<Option<Duration>>,
    sink: Mutex<Option<EventSink>>,
    snapshot: Mutex<Snapshot>,
}

/// Test-side handle to a [`FakeWidget`] living on a worker thread.
pub(crate) struct FakeProbe {
    state: Arc<FakeState>,
}

impl FakeProbe {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
        }
    }

    /// A factory constructing the fake on whichever thread runs it.
    pub(crate) fn factory(
        &self,
    ) -> impl FnOnce() -> Result<FakeWidget, WidgetError> + Send + 'static {
        let state = Arc::clone(&self.state);
        move || Ok(FakeWidget::new(state))
    }

    /// A factory that fails construction.
    pub(crate) fn failing_factory(
        message: &'static str,
    ) -> impl FnOnce() -> Result<FakeWidget, WidgetError> + Send + 'static {
        move || Err(WidgetError::Construction(message.into()))
    }

    /// Spawn a worker around a fresh fake and complete the handshake. The
    /// call log starts empty afterwards (worker startup mutations are
    /// cleared).
    pub(crate) fn spawn_worker(&self) -> CallProxy<FakeWidget> {
        let ready = Arc::new(ReadySignal::new());
        let startup_error = Arc::new(Mutex::new(None));
        let proxy = worker::spawn(
            self.factory(),
            Arc::new(|_| {}),
            Arc::clone(&ready),
            Arc::clone(&startup_error),
        )
        .unwrap();
        ready.wait();
        assert!(startup_error.lock().is_none());
        self.clear_calls();
        proxy
    }

    pub(crate) fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.state
            .files
            .lock()
            .insert(path.into(), contents.into());
    }

    /// Make every subsequent load block for `delay`, simulating a large
    /// file.
    pub(crate) fn set_load_delay(&self, delay: Duration) {
        *self.state.load_delay.lock() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<WidgetCall> {
        self.state.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.calls.lock().clear();
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.state.snapshot.lock().clone()
    }

    pub(crate) fn widget_parent(&self) -> Option<WindowHandle> {
        self.snapshot().parent
    }

    /// Raise a raw input event through the installed sink, as the widget
    /// would.
    pub(crate) fn fire(&self, event: WidgetEvent) {
        let sink = self
            .state
            .sink
            .lock()
            .clone()
            .expect("no event sink installed");
        sink(event);
    }
}

/// The in-memory thread-affine widget.
pub(crate) struct FakeWidget {
    state: Arc<FakeState>,
    home_thread: ThreadId,
    back_color: Color,
    fore_color: Color,
    border_style: BorderStyle,
    read_only: bool,
    multiline: bool,
    accepts_tab: bool,
    max_length: u32,
    scrollbars: ScrollBars,
    detect_urls: bool,
    text: String,
    rich: String,
    visible: bool,
    parent: Option<WindowHandle>,
    position: Point,
    size: Size,
}

impl FakeWidget {
    fn new(state: Arc<FakeState>) -> Self {
        Self {
            state,
            home_thread: thread::current().id(),
            back_color: Color::WINDOW,
            fore_color: Color::rgb(0, 0, 0),
            border_style: BorderStyle::default(),
            read_only: false,
            multiline: true,
            accepts_tab: false,
            max_length: u32::MAX,
            scrollbars: ScrollBars::default(),
            detect_urls: false,
            text: String::new(),
            rich: String::new(),
            visible: true,
            parent: None,
            position: Point::ORIGIN,
            size: Size::default(),
        }
    }

    fn affine(&self) {
        assert_eq!(
            thread::current().id(),
            self.home_thread,
            "widget touched off its owning thread"
        );
    }

    fn record(&self, call: WidgetCall) {
        self.state.calls.lock().push(call);
    }

    fn mirror(&self) {
        let mut snapshot = self.state.snapshot.lock();
        snapshot.read_only = self.read_only;
        snapshot.visible = self.visible;
        snapshot.parent = self.parent;
        snapshot.position = self.position;
        snapshot.size = self.size;
        snapshot.text = self.text.clone();
    }

    fn lookup(&self, path: &Path) -> Result<String, WidgetError> {
        if let Some(delay) = *self.state.load_delay.lock() {
            thread::sleep(delay);
        }
        self.state
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| WidgetError::NotFound {
                path: path.to_owned(),
            })
    }
}

impl RichTextWidget for FakeWidget {
    fn back_color(&self) -> Color {
        self.affine();
        self.back_color
    }
    fn set_back_color(&mut self, color: Color) {
        self.affine();
        self.back_color = color;
    }

    fn fore_color(&self) -> Color {
        self.affine();
        self.fore_color
    }
    fn set_fore_color(&mut self, color: Color) {
        self.affine();
        self.fore_color = color;
    }

    fn border_style(&self) -> BorderStyle {
        self.affine();
        self.border_style
    }
    fn set_border_style(&mut self, style: BorderStyle) {
        self.affine();
        self.border_style = style;
    }

    fn read_only(&self) -> bool {
        self.affine();
        self.read_only
    }
    fn set_read_only(&mut self, read_only: bool) {
        self.affine();
        self.read_only = read_only;
        self.record(WidgetCall::SetReadOnly(read_only));
        self.mirror();
    }

    fn multiline(&self) -> bool {
        self.affine();
        self.multiline
    }
    fn set_multiline(&mut self, multiline: bool) {
        self.affine();
        self.multiline = multiline;
    }

    fn accepts_tab(&self) -> bool {
        self.affine();
        self.accepts_tab
    }
    fn set_accepts_tab(&mut self, accepts_tab: bool) {
        self.affine();
        self.accepts_tab = accepts_tab;
    }

    fn max_length(&self) -> u32 {
        self.affine();
        self.max_length
    }
    fn set_max_length(&mut self, max_length: u32) {
        self.affine();
        self.max_length = max_length;
    }

    fn scrollbars(&self) -> ScrollBars {
        self.affine();
        self.scrollbars
    }
    fn set_scrollbars(&mut self, scrollbars: ScrollBars) {
        self.affine();
        self.scrollbars = scrollbars;
    }

    fn detect_urls(&self) -> bool {
        self.affine();
        self.detect_urls
    }
    fn set_detect_urls(&mut self, detect: bool) {
        self.affine();
        self.detect_urls = detect;
    }

    fn text(&self) -> String {
        self.affine();
        self.text.clone()
    }
    fn set_text(&mut self, text: &str) {
        self.affine();
        self.text = text.to_owned();
        self.mirror();
    }

    fn rich_text(&self) -> String {
        self.affine();
        self.rich.clone()
    }
    fn set_rich_text(&mut self, markup: &str) {
        self.affine();
        self.rich = markup.to_owned();
        self.mirror();
    }

    fn lines(&self) -> Vec<String> {
        self.affine();
        self.text.lines().map(str::to_owned).collect()
    }

    fn load_file(&mut self, path: &Path) -> Result<(), WidgetError> {
        self.affine();
        self.record(WidgetCall::LoadFile(path.to_owned()));
        let contents = self.lookup(path)?;
        self.text = contents;
        self.mirror();
        Ok(())
    }

    fn load_file_with(&mut self, path: &Path, kind: StreamKind) -> Result<(), WidgetError> {
        self.affine();
        self.record(WidgetCall::LoadFileWith(path.to_owned(), kind));
        let contents = self.lookup(path)?;
        self.text = contents;
        self.mirror();
        Ok(())
    }

    fn load_stream(&mut self, data: &mut dyn Read, kind: StreamKind) -> Result<(), WidgetError> {
        self.affine();
        self.record(WidgetCall::LoadStream(kind));
        if let Some(delay) = *self.state.load_delay.lock() {
            thread::sleep(delay);
        }
        let mut contents = String::new();
        data.read_to_string(&mut contents)
            .map_err(WidgetError::UnreadableStream)?;
        self.text = contents;
        self.mirror();
        Ok(())
    }

    fn focus(&mut self) {
        self.affine();
        self.record(WidgetCall::Focus);
        self.state.snapshot.lock().focus_count += 1;
    }

    fn visible(&self) -> bool {
        self.affine();
        self.visible
    }
    fn set_visible(&mut self, visible: bool) {
        self.affine();
        self.visible = visible;
        self.record(WidgetCall::SetVisible(visible));
        self.mirror();
    }

    fn parent(&self) -> Option<WindowHandle> {
        self.affine();
        self.parent
    }
    fn set_parent(&mut self, parent: Option<WindowHandle>) {
        self.affine();
        self.parent = parent;
        self.record(WidgetCall::SetParent(parent));
        self.mirror();
    }

    fn set_position(&mut self, position: Point) {
        self.affine();
        self.position = position;
        self.record(WidgetCall::SetPosition(position));
        self.mirror();
    }

    fn set_size(&mut self, size: Size) {
        self.affine();
        self.size = size;
        self.record(WidgetCall::SetSize(size));
        self.mirror();
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.affine();
        *self.state.sink.lock() = Some(sink);
    }
}

/// A recording host window standing in for the embedding UI.
///
/// `post_to_ui` queues jobs; [`pump_ui`](Self::pump_ui) plays the primary
/// dispatch loop and drains them.
pub(crate) struct RecordingHost {
    handle: WindowHandle,
    size: Mutex<Size>,
    has_focus: AtomicBool,
    focuser_focused: AtomicBool,
    claims: AtomicUsize,
    advances: Mutex<Vec<bool>>,
    ui_jobs: Mutex<Vec<UiJob>>,
    on_claim: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self {
            handle: WindowHandle(0x1234),
            size: Mutex::new(Size::new(800, 600)),
            has_focus: AtomicBool::new(false),
            focuser_focused: AtomicBool::new(false),
            claims: AtomicUsize::new(0),
            advances: Mutex::new(Vec::new()),
            ui_jobs: Mutex::new(Vec::new()),
            on_claim: Mutex::new(None),
        }
    }

    pub(crate) fn set_size(&self, size: Size) {
        *self.size.lock() = size;
    }

    pub(crate) fn set_has_focus(&self, focused: bool) {
        self.has_focus.store(focused, Ordering::Release);
        self.focuser_focused.store(focused, Ordering::Release);
    }

    pub(crate) fn claim_count(&self) -> usize {
        self.claims.load(Ordering::Acquire)
    }

    pub(crate) fn advances(&self) -> Vec<bool> {
        self.advances.lock().clone()
    }

    pub(crate) fn set_on_claim(&self, f: impl Fn() + Send + 'static) {
        *self.on_claim.lock() = Some(Box::new(f));
    }

    /// Drain and run queued UI jobs, as the primary dispatch loop would.
    pub(crate) fn pump_ui(&self) {
        loop {
            let jobs: Vec<UiJob> = std::mem::take(&mut *self.ui_jobs.lock());
            if jobs.is_empty() {
                return;
            }
            for job in jobs {
                job();
            }
        }
    }
}

impl HostWindow for RecordingHost {
    fn window_handle(&self) -> WindowHandle {
        self.handle
    }

    fn client_size(&self) -> Size {
        *self.size.lock()
    }

    fn has_focus(&self) -> bool {
        self.has_focus.load(Ordering::Acquire)
    }

    fn focuser_focused(&self) -> bool {
        self.focuser_focused.load(Ordering::Acquire)
    }

    fn claim_focus(&self) {
        self.claims.fetch_add(1, Ordering::AcqRel);
        self.focuser_focused.store(true, Ordering::Release);
        self.has_focus.store(true, Ordering::Release);
        if let Some(callback) = &*self.on_claim.lock() {
            callback();
        }
    }

    fn advance_focus(&self, forward: bool) {
        self.advances.lock().push(forward);
        self.focuser_focused.store(false, Ordering::Release);
        self.has_focus.store(false, Ordering::Release);
    }

    fn post_to_ui(&self, job: UiJob) {
        self.ui_jobs.lock().push(job);
    }
}
