//! The host facade: the single externally-visible control.
//!
//! Construction is cheap and thread-agnostic; [`RichTextHost::initialize`]
//! performs the one-time startup handshake that spawns the worker context,
//! waits for widget construction, and grafts the widget's window into the
//! host hierarchy. After that, every property read/write is a thin
//! blocking-forward through the call marshaling facade — the only path by
//! which any thread may observe or change widget state.

use std::sync::Arc;

use log::{debug, info};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::embed::EmbedController;
use crate::error::{HostError, Result, WidgetError};
use crate::marshal::CallProxy;
use crate::relay::{self, HostWindow, RelayShared};
use crate::signal::ReadySignal;
use crate::widget::{
    BorderStyle, Color, RichTextWidget, ScrollBars, WindowHandle,
};
use crate::worker;

/// How the facade was constructed.
///
/// Replaces the original system's ambient "am I in a designer" probe with an
/// explicit parameter: a preview-mode host never spawns a worker and never
/// forwards calls, which is what a visual designer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Full runtime behavior: worker context, embedding, relays.
    Interactive,
    /// Design-surface placeholder: `initialize` is a quiet no-op.
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    Initializing,
    Ready,
}

pub(crate) struct HostInner<W> {
    mode: HostMode,
    pub(crate) host: Arc<dyn HostWindow>,
    state: Mutex<InitState>,
    ready: Arc<ReadySignal>,
    pub(crate) relay: Arc<RelayShared>,
    startup_error: Arc<Mutex<Option<WidgetError>>>,
    /// Captured once; never re-read from the primary thread inside worker
    /// code.
    host_handle: OnceCell<WindowHandle>,
    proxy: Mutex<Option<CallProxy<W>>>,
    embed: Mutex<Option<Arc<EmbedController<W>>>>,
}

impl<W: RichTextWidget> HostInner<W> {
    /// The marshaling proxy, available once initialization has completed.
    pub(crate) fn proxy(&self) -> Result<CallProxy<W>> {
        if *self.state.lock() != InitState::Ready {
            return Err(HostError::NotInitialized);
        }
        self.proxy.lock().clone().ok_or(HostError::NotInitialized)
    }

    pub(crate) fn embed(&self) -> Result<Arc<EmbedController<W>>> {
        if *self.state.lock() != InitState::Ready {
            return Err(HostError::NotInitialized);
        }
        self.embed
            .lock()
            .as_ref()
            .map(Arc::clone)
            .ok_or(HostError::NotInitialized)
    }
}

/// The externally-visible composite control.
///
/// Clonable handle; clones share one worker context and one widget.
pub struct RichTextHost<W: RichTextWidget> {
    pub(crate) inner: Arc<HostInner<W>>,
}

impl<W: RichTextWidget> Clone for RichTextHost<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Generates the proxied-property surface: a declarative table mapping each
/// property to its getter/setter thunks, every one a blocking-forward onto
/// the worker context.
macro_rules! proxied_properties {
    ($($(#[$doc:meta])* $getter:ident / $setter:ident : $ty:ty;)+) => {
        $(
            $(#[$doc])*
            pub fn $getter(&self) -> Result<$ty> {
                self.inner.proxy()?.invoke(|w| w.$getter())
            }

            pub fn $setter(&self, value: $ty) -> Result<()> {
                self.inner.proxy()?.invoke(move |w| w.$setter(value))
            }
        )+
    };
}

impl<W: RichTextWidget> RichTextHost<W> {
    /// Create an uninitialized facade around the embedding UI.
    pub fn new(host: Arc<dyn HostWindow>, mode: HostMode) -> Self {
        Self {
            inner: Arc::new(HostInner {
                mode,
                host,
                state: Mutex::new(InitState::Uninitialized),
                ready: Arc::new(ReadySignal::new()),
                relay: Arc::new(RelayShared::new()),
                startup_error: Arc::new(Mutex::new(None)),
                host_handle: OnceCell::new(),
                proxy: Mutex::new(None),
                embed: Mutex::new(None),
            }),
        }
    }

    /// Spin up the worker context, construct the widget on it, and embed
    /// the widget's window into the host hierarchy.
    ///
    /// Blocks the calling thread for the startup handshake only (never for
    /// content loads). Exactly one successful call per facade; a second
    /// call faults with [`HostError::AlreadyInitialized`] and leaves the
    /// first worker context untouched. On a preview-mode host this is a
    /// quiet no-op.
    pub fn initialize<F>(&self, factory: F) -> Result<()>
    where
        F: FnOnce() -> Result<W, WidgetError> + Send + 'static,
    {
        if self.inner.mode == HostMode::Preview {
            debug!("[Host] Preview mode, skipping worker startup");
            return Ok(());
        }

        {
            let mut state = self.inner.state.lock();
            match *state {
                InitState::Uninitialized => *state = InitState::Initializing,
                _ => return Err(HostError::AlreadyInitialized),
            }
        }

        match self.start_worker(factory) {
            Ok(()) => {
                *self.inner.state.lock() = InitState::Ready;
                Ok(())
            }
            Err(e) => {
                // Construction failed; the spawned thread has already
                // exited. Allow another attempt.
                *self.inner.state.lock() = InitState::Uninitialized;
                Err(e)
            }
        }
    }

    fn start_worker<F>(&self, factory: F) -> Result<()>
    where
        F: FnOnce() -> Result<W, WidgetError> + Send + 'static,
    {
        let inner = &self.inner;
        let handle = *inner
            .host_handle
            .get_or_init(|| inner.host.window_handle());

        info!("[Host] Starting worker context");
        let sink = relay::make_sink(Arc::clone(&inner.host), Arc::clone(&inner.relay));
        let proxy = worker::spawn(
            factory,
            sink,
            Arc::clone(&inner.ready),
            Arc::clone(&inner.startup_error),
        )?;

        // Block until the worker has finished constructing the widget —
        // not until the worker finishes (its dispatch loop never does).
        inner.ready.wait();
        if let Some(e) = inner.startup_error.lock().take() {
            return Err(HostError::Widget(e));
        }

        let embed = Arc::new(EmbedController::new(proxy.clone(), handle));
        embed.attach(inner.host.client_size())?;
        proxy.invoke(|w| w.set_visible(true))?;

        *inner.proxy.lock() = Some(proxy);
        *inner.embed.lock() = Some(embed);
        info!("[Host] Worker ready, widget embedded under {handle:?}");
        Ok(())
    }

    /// Whether the startup handshake has completed.
    pub fn is_initialized(&self) -> bool {
        *self.inner.state.lock() == InitState::Ready
    }

    /// Whether the widget's window is currently grafted into the host
    /// hierarchy.
    pub fn is_attached(&self) -> bool {
        self.inner
            .embed()
            .map(|embed| embed.is_attached())
            .unwrap_or(false)
    }

    /// Host resize notification: forward a size-set with a snapshot of the
    /// current host size. Quiet before initialization.
    pub fn notify_resized(&self) {
        let Ok(embed) = self.inner.embed() else {
            return;
        };
        embed.resize(self.inner.host.client_size());
    }

    /// The facade was entered in the primary focus system (tab navigation,
    /// programmatic select). Relays focus into the widget when it is
    /// visible; when hidden, quietly retains default focus on the hidden
    /// focuser element. Suppressed while a worker-initiated focus claim is
    /// in flight.
    pub fn notify_entered(&self) {
        if !self.inner.relay.events_enabled() {
            return;
        }
        let Ok(proxy) = self.inner.proxy() else {
            return;
        };
        proxy.post(|w| {
            if w.visible() {
                w.focus();
            }
        });
    }

    proxied_properties! {
        /// Widget background color.
        back_color / set_back_color: Color;
        /// Widget text color.
        fore_color / set_fore_color: Color;
        /// Border drawn around the widget.
        border_style / set_border_style: BorderStyle;
        /// Whether the widget rejects edits.
        read_only / set_read_only: bool;
        /// Whether the widget spans multiple lines.
        multiline / set_multiline: bool;
        /// Whether the tab key inserts a tab character instead of
        /// traversing focus.
        accepts_tab / set_accepts_tab: bool;
        /// Maximum number of characters the widget accepts.
        max_length / set_max_length: u32;
        /// Which scrollbars the widget shows.
        scrollbars / set_scrollbars: ScrollBars;
        /// Whether typed URLs become live links.
        detect_urls / set_detect_urls: bool;
    }

    /// The whole document as plain text.
    pub fn text(&self) -> Result<String> {
        self.inner.proxy()?.invoke(|w| w.text())
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.inner.proxy()?.invoke(move |w| w.set_text(&text))
    }

    /// The whole document as rich-text markup.
    pub fn rich_text(&self) -> Result<String> {
        self.inner.proxy()?.invoke(|w| w.rich_text())
    }

    pub fn set_rich_text(&self, markup: impl Into<String>) -> Result<()> {
        let markup = markup.into();
        self.inner.proxy()?.invoke(move |w| w.set_rich_text(&markup))
    }

    /// The document split into lines.
    pub fn lines(&self) -> Result<Vec<String>> {
        self.inner.proxy()?.invoke(|w| w.lines())
    }
}
