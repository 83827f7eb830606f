//! The real rich-edit control, wrapped as a [`RichTextWidget`].
//!
//! Every operation is `SendMessageW` traffic (or a window-long mutation)
//! against a window that belongs to the worker thread. The control is
//! created as a hidden top-level `WS_POPUP` window; attaching flips it to
//! `WS_CHILD` before reparenting so the host window's non-client hit
//! testing keeps working, and detaching restores `WS_POPUP`.
//!
//! Input relaying subclasses the control's window procedure and stores the
//! relay state behind `GWLP_USERDATA`.

use std::io::{self, Read};
use std::path::Path;

use log::{debug, warn};

use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, SetFocus, VK_SHIFT, VK_TAB};
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW, CreateWindowExW, DefWindowProcW, DispatchMessageW, GetWindowLongPtrW,
    GetWindowTextLengthW, GetWindowTextW, IsWindowVisible, MoveWindow, PeekMessageW,
    SendMessageW, SetParent, SetWindowLongPtrW, SetWindowPos, SetWindowTextW, ShowWindow,
    TranslateMessage, GWLP_USERDATA, GWLP_WNDPROC, GWL_EXSTYLE, GWL_STYLE, HWND_TOP, MSG,
    PM_REMOVE, SWP_FRAMECHANGED, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SW_HIDE, SW_SHOW,
    WINDOW_STYLE, WM_KEYDOWN, WM_LBUTTONDOWN, WNDPROC, WS_BORDER, WS_CHILD, WS_EX_CLIENTEDGE,
    WS_HSCROLL, WS_POPUP, WS_VSCROLL,
};

use crate::error::WidgetError;
use crate::widget::{
    BorderStyle, Color, EventSink, Point, RichTextWidget, ScrollBars, Size, StreamKind,
    WidgetEvent, WindowHandle,
};

use super::{
    to_wide, RichEditDll, CFM_COLOR, DEFAULT_WIDGET_HEIGHT, DEFAULT_WIDGET_WIDTH,
    EM_AUTOURLDETECT, EM_EXLIMITTEXT, EM_GETAUTOURLDETECT, EM_GETLIMITTEXT, EM_SETBKGNDCOLOR,
    EM_SETCHARFORMAT, EM_SETREADONLY, EM_STREAMIN, EM_STREAMOUT, RICHEDIT_CLASS, SCF_ALL,
    SF_RTF, SF_RTFNOOBJS, SF_TEXT, SF_TEXTIZED, SF_UNICODE,
};

// Edit-control styles not re-exported by the windows crate feature set we
// carry.
const ES_MULTILINE: u32 = 0x0004;
const ES_AUTOVSCROLL: u32 = 0x0040;
const ES_READONLY: u32 = 0x0800;

/// Relay state reachable from the subclassed window procedure.
struct SubclassState {
    prev_proc: WNDPROC,
    sink: Option<EventSink>,
    accepts_tab: bool,
}

/// The hosted Win32 rich-edit control.
///
/// `HWND` is a raw pointer, so the type is `!Send` by construction — the
/// compiler refuses to move it off the worker thread that created it.
pub struct Win32RichEdit {
    hwnd: HWND,
    _dll: RichEditDll,
    subclass: Box<SubclassState>,
    // Properties the control cannot report back; cached on set.
    back_color: Color,
    fore_color: Color,
    border_style: BorderStyle,
    scrollbars: ScrollBars,
    parent: Option<WindowHandle>,
    position: Point,
    size: Size,
}

impl Win32RichEdit {
    /// A `Send` factory for [`RichTextHost::initialize`]; the control
    /// itself is constructed on the worker thread.
    ///
    /// [`RichTextHost::initialize`]: crate::RichTextHost::initialize
    pub fn factory() -> impl FnOnce() -> Result<Self, WidgetError> + Send + 'static {
        Self::create
    }

    fn create() -> Result<Self, WidgetError> {
        let dll = RichEditDll::load()?;
        let class = to_wide(RICHEDIT_CLASS);

        let hinstance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| WidgetError::Construction(format!("GetModuleHandleW: {e}")))?;

        // Created as a hidden top-level popup; attach() turns it into a
        // child of the host window.
        // SAFETY: class is the null-terminated name registered by the
        // rich-edit DLL held in `dll`.
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_CLIENTEDGE,
                PCWSTR(class.as_ptr()),
                PCWSTR::null(),
                WS_POPUP
                    | WS_VSCROLL
                    | WS_HSCROLL
                    | WINDOW_STYLE(ES_MULTILINE | ES_AUTOVSCROLL),
                0,
                0,
                DEFAULT_WIDGET_WIDTH,
                DEFAULT_WIDGET_HEIGHT,
                None,
                None,
                Some(hinstance.into()),
                None,
            )
        }
        .map_err(|e| WidgetError::Construction(format!("CreateWindowExW: {e}")))?;

        let mut subclass = Box::new(SubclassState {
            prev_proc: None,
            sink: None,
            accepts_tab: false,
        });

        // SAFETY: hwnd is valid and owned by this thread; the state box
        // outlives the window because both live in the returned widget,
        // which the worker context never drops.
        unsafe {
            SetWindowLongPtrW(
                hwnd,
                GWLP_USERDATA,
                &mut *subclass as *mut SubclassState as isize,
            );
            let prev = SetWindowLongPtrW(hwnd, GWLP_WNDPROC, relay_proc as usize as isize);
            subclass.prev_proc = std::mem::transmute::<isize, WNDPROC>(prev);
        }

        debug!("[Win32] Rich-edit control created: {hwnd:?}");
        Ok(Self {
            hwnd,
            _dll: dll,
            subclass,
            back_color: Color::WINDOW,
            fore_color: Color::rgb(0, 0, 0),
            border_style: BorderStyle::Fixed3D,
            scrollbars: ScrollBars::Both,
            parent: None,
            position: Point::ORIGIN,
            size: Size::new(DEFAULT_WIDGET_WIDTH, DEFAULT_WIDGET_HEIGHT),
        })
    }

    fn send(&self, msg: u32, wparam: usize, lparam: isize) -> isize {
        // SAFETY: hwnd is a valid rich-edit window owned by this thread.
        unsafe { SendMessageW(self.hwnd, msg, Some(WPARAM(wparam)), Some(LPARAM(lparam))).0 }
    }

    fn style(&self) -> isize {
        // SAFETY: hwnd valid; read-only query.
        unsafe { GetWindowLongPtrW(self.hwnd, GWL_STYLE) }
    }

    fn set_style_bits(&self, set: WINDOW_STYLE, clear: WINDOW_STYLE) {
        // SAFETY: hwnd valid; style mutation on the owning thread.
        unsafe {
            let old = GetWindowLongPtrW(self.hwnd, GWL_STYLE);
            let new = (old & !(clear.0 as isize)) | set.0 as isize;
            SetWindowLongPtrW(self.hwnd, GWL_STYLE, new);
        }
    }

    fn refresh_frame(&self) {
        // SAFETY: hwnd valid; non-client refresh after a style change.
        unsafe {
            let _ = SetWindowPos(
                self.hwnd,
                Some(HWND_TOP),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_FRAMECHANGED,
            );
        }
    }

    fn stream_in(&mut self, data: &mut dyn Read, flags: u32) -> Result<(), WidgetError> {
        let mut cookie: &mut dyn Read = data;
        let mut stream = EditStream {
            dw_cookie: (&mut cookie) as *mut &mut dyn Read as usize,
            dw_error: 0,
            pfn_callback: stream_in_callback,
        };
        self.send(
            EM_STREAMIN,
            flags as usize,
            &mut stream as *mut EditStream as isize,
        );
        if stream.dw_error != 0 {
            return Err(WidgetError::Malformed(format!(
                "rich-edit rejected the stream (error {})",
                stream.dw_error
            )));
        }
        Ok(())
    }

    fn stream_out(&self, flags: u32) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        let mut stream = EditStream {
            dw_cookie: (&mut out) as *mut Vec<u8> as usize,
            dw_error: 0,
            pfn_callback: stream_out_callback,
        };
        self.send(
            EM_STREAMOUT,
            flags as usize,
            &mut stream as *mut EditStream as isize,
        );
        out
    }

    fn load_bytes(&mut self, path: &Path, flags: Option<u32>) -> Result<(), WidgetError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WidgetError::NotFound {
                path: path.to_owned(),
            },
            _ => WidgetError::Io(e),
        })?;
        // No format hint: sniff the rich-text signature.
        let flags = flags.unwrap_or(if bytes.starts_with(b"{\\rtf") {
            SF_RTF
        } else {
            SF_TEXT
        });
        self.stream_in(&mut bytes.as_slice(), flags)
    }

    fn pump_messages(&mut self) {
        let mut msg = MSG::default();
        // SAFETY: standard message pump on the thread that owns the
        // window; this is what keeps the control's handlers responsive.
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

fn stream_flags(kind: StreamKind) -> u32 {
    match kind {
        StreamKind::RichText => SF_RTF,
        StreamKind::PlainText => SF_TEXT,
        StreamKind::RichNoOle => SF_RTFNOOBJS,
        StreamKind::TextTextOle => SF_TEXTIZED,
        StreamKind::UnicodePlainText => SF_TEXT | SF_UNICODE,
    }
}

fn colorref(color: Color) -> COLORREF {
    COLORREF((color.r as u32) | ((color.g as u32) << 8) | ((color.b as u32) << 16))
}

impl RichTextWidget for Win32RichEdit {
    fn back_color(&self) -> Color {
        self.back_color
    }
    fn set_back_color(&mut self, color: Color) {
        self.back_color = color;
        self.send(EM_SETBKGNDCOLOR, 0, colorref(color).0 as isize);
    }

    fn fore_color(&self) -> Color {
        self.fore_color
    }
    fn set_fore_color(&mut self, color: Color) {
        self.fore_color = color;
        let mut format = CharFormatW {
            cb_size: std::mem::size_of::<CharFormatW>() as u32,
            dw_mask: CFM_COLOR,
            cr_text_color: colorref(color).0,
            ..CharFormatW::zeroed()
        };
        self.send(
            EM_SETCHARFORMAT,
            SCF_ALL as usize,
            &mut format as *mut CharFormatW as isize,
        );
    }

    fn border_style(&self) -> BorderStyle {
        self.border_style
    }
    fn set_border_style(&mut self, style: BorderStyle) {
        self.border_style = style;
        // SAFETY: hwnd valid; extended-style mutation on the owning thread.
        unsafe {
            let old = GetWindowLongPtrW(self.hwnd, GWL_EXSTYLE);
            let new = match style {
                BorderStyle::Fixed3D => old | WS_EX_CLIENTEDGE.0 as isize,
                _ => old & !(WS_EX_CLIENTEDGE.0 as isize),
            };
            SetWindowLongPtrW(self.hwnd, GWL_EXSTYLE, new);
        }
        match style {
            BorderStyle::FixedSingle => self.set_style_bits(WS_BORDER, WINDOW_STYLE(0)),
            _ => self.set_style_bits(WINDOW_STYLE(0), WS_BORDER),
        }
        self.refresh_frame();
    }

    fn read_only(&self) -> bool {
        self.style() & ES_READONLY as isize != 0
    }
    fn set_read_only(&mut self, read_only: bool) {
        self.send(EM_SETREADONLY, read_only as usize, 0);
    }

    fn multiline(&self) -> bool {
        self.style() & ES_MULTILINE as isize != 0
    }
    fn set_multiline(&mut self, multiline: bool) {
        // Best effort: the control honors this style only partially after
        // creation.
        if multiline {
            self.set_style_bits(WINDOW_STYLE(ES_MULTILINE), WINDOW_STYLE(0));
        } else {
            self.set_style_bits(WINDOW_STYLE(0), WINDOW_STYLE(ES_MULTILINE));
        }
    }

    fn accepts_tab(&self) -> bool {
        self.subclass.accepts_tab
    }
    fn set_accepts_tab(&mut self, accepts_tab: bool) {
        self.subclass.accepts_tab = accepts_tab;
    }

    fn max_length(&self) -> u32 {
        self.send(EM_GETLIMITTEXT, 0, 0) as u32
    }
    fn set_max_length(&mut self, max_length: u32) {
        self.send(EM_EXLIMITTEXT, 0, max_length as isize);
    }

    fn scrollbars(&self) -> ScrollBars {
        self.scrollbars
    }
    fn set_scrollbars(&mut self, scrollbars: ScrollBars) {
        self.scrollbars = scrollbars;
        let (vertical, horizontal) = match scrollbars {
            ScrollBars::None => (false, false),
            ScrollBars::Horizontal => (false, true),
            ScrollBars::Vertical => (true, false),
            ScrollBars::Both => (true, true),
        };
        let mut set = WINDOW_STYLE(0);
        let mut clear = WINDOW_STYLE(0);
        if vertical { set |= WS_VSCROLL } else { clear |= WS_VSCROLL }
        if horizontal { set |= WS_HSCROLL } else { clear |= WS_HSCROLL }
        self.set_style_bits(set, clear);
        self.refresh_frame();
    }

    fn detect_urls(&self) -> bool {
        self.send(EM_GETAUTOURLDETECT, 0, 0) != 0
    }
    fn set_detect_urls(&mut self, detect: bool) {
        self.send(EM_AUTOURLDETECT, detect as usize, 0);
    }

    fn text(&self) -> String {
        // SAFETY: hwnd valid; buffer length comes from the control itself.
        unsafe {
            let len = GetWindowTextLengthW(self.hwnd);
            if len <= 0 {
                return String::new();
            }
            let mut buf = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(self.hwnd, &mut buf);
            String::from_utf16_lossy(&buf[..copied.max(0) as usize])
        }
    }
    fn set_text(&mut self, text: &str) {
        let wide = to_wide(text);
        // SAFETY: wide is null-terminated UTF-16 outliving the call.
        unsafe {
            let _ = SetWindowTextW(self.hwnd, PCWSTR(wide.as_ptr()));
        }
    }

    fn rich_text(&self) -> String {
        String::from_utf8_lossy(&self.stream_out(SF_RTF)).into_owned()
    }
    fn set_rich_text(&mut self, markup: &str) {
        let mut bytes = markup.as_bytes();
        if let Err(e) = self.stream_in(&mut bytes, SF_RTF) {
            warn!("[Win32] set_rich_text rejected: {e}");
        }
    }

    fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_owned).collect()
    }

    fn load_file(&mut self, path: &Path) -> Result<(), WidgetError> {
        self.load_bytes(path, None)
    }

    fn load_file_with(&mut self, path: &Path, kind: StreamKind) -> Result<(), WidgetError> {
        self.load_bytes(path, Some(stream_flags(kind)))
    }

    fn load_stream(&mut self, data: &mut dyn Read, kind: StreamKind) -> Result<(), WidgetError> {
        self.stream_in(data, stream_flags(kind))
    }

    fn focus(&mut self) {
        // SAFETY: hwnd valid; focus moves within the worker's input state.
        unsafe {
            let _ = SetFocus(Some(self.hwnd));
        }
    }

    fn visible(&self) -> bool {
        // SAFETY: hwnd valid; read-only query.
        unsafe { IsWindowVisible(self.hwnd).as_bool() }
    }
    fn set_visible(&mut self, visible: bool) {
        let cmd = if visible { SW_SHOW } else { SW_HIDE };
        // SAFETY: hwnd valid; previous visibility intentionally unused.
        unsafe {
            let _ = ShowWindow(self.hwnd, cmd);
        }
    }

    fn parent(&self) -> Option<WindowHandle> {
        self.parent
    }
    fn set_parent(&mut self, parent: Option<WindowHandle>) {
        match parent {
            Some(handle) => {
                // Child style first, then reparent, so the host's
                // non-client hit testing works from the first frame.
                self.set_style_bits(WS_CHILD, WS_POPUP);
                // SAFETY: both handles are valid windows; the host handle
                // was captured on the primary thread and is stable.
                let result = unsafe { SetParent(self.hwnd, Some(HWND(handle.0 as _))) };
                if let Err(e) = result {
                    warn!("[Win32] SetParent({handle:?}) failed: {e}");
                }
            }
            None => {
                // SAFETY: detaching a valid child window.
                let result = unsafe { SetParent(self.hwnd, None) };
                if let Err(e) = result {
                    warn!("[Win32] SetParent(None) failed: {e}");
                }
                self.set_style_bits(WS_POPUP, WS_CHILD);
            }
        }
        self.parent = parent;
    }

    fn set_position(&mut self, position: Point) {
        self.position = position;
        // SAFETY: hwnd valid; repaint requested.
        unsafe {
            let _ = MoveWindow(
                self.hwnd,
                position.x,
                position.y,
                self.size.width,
                self.size.height,
                true,
            );
        }
    }

    fn set_size(&mut self, size: Size) {
        self.size = size;
        // SAFETY: hwnd valid; repaint requested.
        unsafe {
            let _ = MoveWindow(
                self.hwnd,
                self.position.x,
                self.position.y,
                size.width,
                size.height,
                true,
            );
        }
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.subclass.sink = Some(sink);
    }

    fn needs_pump(&self) -> bool {
        true
    }

    fn pump_os_events(&mut self) {
        self.pump_messages();
    }
}

// ── Subclassed window procedure ───────────────────────────────────────────

/// Raise `event` through the installed sink, if any.
fn raise(state: &SubclassState, event: WidgetEvent) {
    if let Some(sink) = &state.sink {
        sink(event);
    }
}

/// # Safety
/// Installed via `SetWindowLongPtrW(GWLP_WNDPROC)` on a window whose
/// `GWLP_USERDATA` holds a live `SubclassState`.
unsafe extern "system" fn relay_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        let state = (GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const SubclassState).as_ref();
        if let Some(state) = state {
            let visible = IsWindowVisible(hwnd).as_bool();
            match msg {
                WM_LBUTTONDOWN => {
                    raise(state, WidgetEvent::PointerPressed { visible });
                }
                WM_KEYDOWN if wparam.0 as u16 == VK_TAB.0 && !state.accepts_tab => {
                    let shift = GetKeyState(VK_SHIFT.0 as i32) < 0;
                    raise(state, WidgetEvent::TabPressed { visible, shift });
                    // Swallowed: the tab traverses focus, it does not
                    // insert.
                    return LRESULT(0);
                }
                _ => {}
            }
            return CallWindowProcW(state.prev_proc, hwnd, msg, wparam, lparam);
        }
        DefWindowProcW(hwnd, msg, wparam, lparam)
    }
}

// ── EM_STREAMIN / EM_STREAMOUT plumbing ───────────────────────────────────

#[repr(C)]
struct EditStream {
    dw_cookie: usize,
    dw_error: u32,
    pfn_callback: unsafe extern "system" fn(usize, *mut u8, i32, *mut i32) -> u32,
}

#[repr(C)]
struct CharFormatW {
    cb_size: u32,
    dw_mask: u32,
    dw_effects: u32,
    y_height: i32,
    y_offset: i32,
    cr_text_color: u32,
    b_char_set: u8,
    b_pitch_and_family: u8,
    sz_face_name: [u16; 32],
}

impl CharFormatW {
    fn zeroed() -> Self {
        // SAFETY: all fields are plain integers/arrays; zero is valid.
        unsafe { std::mem::zeroed() }
    }
}

/// # Safety
/// `cookie` is the address of a live `&mut dyn Read` for the duration of
/// the `EM_STREAMIN` call; `buf` has space for `cb` bytes.
unsafe extern "system" fn stream_in_callback(
    cookie: usize,
    buf: *mut u8,
    cb: i32,
    pcb: *mut i32,
) -> u32 {
    unsafe {
        let reader = &mut *(cookie as *mut &mut dyn Read);
        let dest = std::slice::from_raw_parts_mut(buf, cb.max(0) as usize);
        match reader.read(dest) {
            Ok(n) => {
                *pcb = n as i32;
                0
            }
            Err(_) => 1,
        }
    }
}

/// # Safety
/// `cookie` is the address of a live `Vec<u8>` for the duration of the
/// `EM_STREAMOUT` call; `buf` holds `cb` valid bytes.
unsafe extern "system" fn stream_out_callback(
    cookie: usize,
    buf: *mut u8,
    cb: i32,
    pcb: *mut i32,
) -> u32 {
    unsafe {
        let out = &mut *(cookie as *mut Vec<u8>);
        out.extend_from_slice(std::slice::from_raw_parts(buf, cb.max(0) as usize));
        *pcb = cb;
        0
    }
}
