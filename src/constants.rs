use std::time::Duration;

/// Name of the dedicated worker thread owning the widget.
pub const WORKER_THREAD_NAME: &str = "richedit-worker";

/// Name of the short-lived background threads hosting asynchronous loads.
pub const LOAD_THREAD_NAME: &str = "richedit-load";

/// How long the hybrid dispatch loop waits for a forwarded job before
/// pumping the widget's OS message queue again.
pub const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(8);
