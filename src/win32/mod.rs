//! Win32 rich-edit backend.
//!
//! The one module (with its child) where `unsafe` is permitted: everything
//! here wraps raw window handles and `SendMessageW` traffic. The engine
//! above it stays safe Rust.
//!
//! DLL ownership model: [`RichEditDll`] owns the single `LoadLibraryW` call
//! for the modern rich-edit library. Loading the DLL registers the
//! `RICHEDIT50W` window class; the widget holds the DLL alive for as long
//! as its window exists, and `FreeLibrary` runs on drop — which, for a
//! hosted widget, is never before process exit, since the worker context
//! owning it never terminates.

#![allow(unsafe_code)]

mod richedit;

pub use richedit::Win32RichEdit;

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows::core::PCWSTR;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{FreeLibrary, LoadLibraryW};

use crate::error::WidgetError;

/// The DLL whose load registers the modern rich-edit window class.
pub(crate) const RICHEDIT_DLL: &str = "Msftedit.dll";

/// Window class of the hosted rich-edit control.
pub(crate) const RICHEDIT_CLASS: &str = "RICHEDIT50W";

/// Size given to the control window at creation, before the first attach
/// resizes it to the host.
pub(crate) const DEFAULT_WIDGET_WIDTH: i32 = 640;

/// See [`DEFAULT_WIDGET_WIDTH`].
pub(crate) const DEFAULT_WIDGET_HEIGHT: i32 = 480;

/// Build a null-terminated UTF-16 string for Win32 APIs.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

/// RAII handle to the loaded rich-edit DLL.
pub(crate) struct RichEditDll(HMODULE);

impl RichEditDll {
    /// Load the rich-edit library, registering its window class.
    pub(crate) fn load() -> Result<Self, WidgetError> {
        let name = to_wide(RICHEDIT_DLL);
        // SAFETY: name is a valid null-terminated UTF-16 string.
        let module = unsafe { LoadLibraryW(PCWSTR(name.as_ptr())) }
            .map_err(|e| WidgetError::Construction(format!("{RICHEDIT_DLL}: {e}")))?;
        Ok(Self(module))
    }
}

impl Drop for RichEditDll {
    fn drop(&mut self) {
        // SAFETY: self.0 came from a successful LoadLibraryW and has not
        // been freed since; the widget window is already gone.
        unsafe {
            let _ = FreeLibrary(self.0);
        }
    }
}

// ── Rich-edit message constants ───────────────────────────────────────────
//
// Declared here instead of pulling in the full rich-edit feature surface;
// only the messages this backend actually sends are listed.

pub(crate) const WM_USER: u32 = 0x0400;

pub(crate) const EM_SETBKGNDCOLOR: u32 = WM_USER + 67;
pub(crate) const EM_STREAMIN: u32 = WM_USER + 73;
pub(crate) const EM_STREAMOUT: u32 = WM_USER + 74;
pub(crate) const EM_SETCHARFORMAT: u32 = WM_USER + 68;
pub(crate) const EM_AUTOURLDETECT: u32 = WM_USER + 91;
pub(crate) const EM_GETAUTOURLDETECT: u32 = WM_USER + 92;
pub(crate) const EM_EXLIMITTEXT: u32 = WM_USER + 53;
pub(crate) const EM_GETLIMITTEXT: u32 = WM_USER + 37;
pub(crate) const EM_SETREADONLY: u32 = 0x00CF;

/// `EM_STREAMIN`/`EM_STREAMOUT` format flags.
pub(crate) const SF_TEXT: u32 = 0x0001;
pub(crate) const SF_RTF: u32 = 0x0002;
pub(crate) const SF_RTFNOOBJS: u32 = 0x0003;
pub(crate) const SF_TEXTIZED: u32 = 0x0004;
pub(crate) const SF_UNICODE: u32 = 0x0010;

/// `CHARFORMATW` mask bit for the text color.
pub(crate) const CFM_COLOR: u32 = 0x4000_0000;
pub(crate) const SCF_ALL: u32 = 0x0004;
