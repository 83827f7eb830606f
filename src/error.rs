//! Central error types.
//!
//! Two layers, matching the two parties involved: `WidgetError` is what the
//! native widget collaborator can raise (content faults: missing files,
//! unreadable streams, malformed content), `HostError` is everything the
//! hosting engine itself can raise on top of that (lifecycle misuse and
//! marshaling failures). Content faults are recoverable; the worker
//! dispatch loop keeps running after one.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Faults raised by the native rich-text widget while loading or
/// constructing content.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// The file handed to a load call does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The path that failed to resolve.
        path: PathBuf,
    },

    /// The widget rejected the content (bad rich-text markup, wrong format
    /// for the supplied format hint, …).
    #[error("malformed content: {0}")]
    Malformed(String),

    /// A byte stream handed to `load_stream` failed mid-read.
    #[error("stream unreadable")]
    UnreadableStream(#[source] io::Error),

    /// Any other I/O failure while talking to the widget or the filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The widget could not be constructed on the worker thread.
    #[error("widget construction failed: {0}")]
    Construction(String),
}

/// Faults raised by the hosting engine.
#[derive(Debug, Error)]
pub enum HostError {
    /// `initialize` was called on a host whose worker context already
    /// exists. Programming error; the first worker is left untouched.
    #[error("the hosted widget has already been initialized")]
    AlreadyInitialized,

    /// A forwarded call was issued before initialization completed (or on a
    /// preview-mode host, which never initializes). Programming error.
    #[error("the hosted widget is not initialized")]
    NotInitialized,

    /// The OS refused to spawn the worker thread.
    #[error("worker thread could not be spawned")]
    WorkerSpawn(#[source] io::Error),

    /// The worker dispatch loop is no longer running, so the forwarded call
    /// can never complete.
    #[error("worker execution context is gone")]
    WorkerGone,

    /// A content fault from the widget, surfaced through the facade.
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = HostError> = std::result::Result<T, E>;
