//! Injectable logging for the receiver loop and driver client.
//!
//! This crate does not own a process-wide logging backend. Instead each
//! [`Logger`] wraps a pair of sinks the host process supplies — a plain
//! `Fn(&str)` for informational messages and one for errors — mirroring the
//! `log_info_message` / `log_error_message` function-pointer fields the
//! original C++ client and receiver carried. A `Logger` with no sinks
//! installed is silent.
//!
//! # Examples
//!
//! ```
//! # use vpti::logging::Logger;
//! let logger = Logger::new()
//!     .with_info(|msg| eprintln!("[info] {msg}"))
//!     .with_error(|msg| eprintln!("[error] {msg}"));
//! logger.info("receiver started");
//! ```

use std::sync::Arc;

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

/// A pair of injectable log sinks, or silence if neither is set.
#[derive(Clone, Default)]
pub struct Logger {
    info: Option<Sink>,
    error: Option<Sink>,
}

impl Logger {
    /// A logger with no sinks installed; `info`/`error` are no-ops.
    pub fn new() -> Self {
        Logger {
            info: None,
            error: None,
        }
    }

    pub fn with_info<F: Fn(&str) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.info = Some(Arc::new(f));
        self
    }

    pub fn with_error<F: Fn(&str) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn info(&self, msg: &str) {
        if let Some(f) = &self.info {
            f(msg);
        }
        #[cfg(feature = "logwise")]
        logwise::info_sync!("{msg}", msg = msg);
    }

    pub fn error(&self, msg: &str) {
        if let Some(f) = &self.error {
            f(msg);
        }
        #[cfg(feature = "logwise")]
        logwise::error_sync!("{msg}", msg = msg);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("info", &self.info.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
