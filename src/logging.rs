//! Diagnostic logging
//!
//! The pipeline reports everything through a [`Logger`], a cheap handle onto
//! a replaceable [`LogSink`]. The sink is owned by the [`Context`](crate::Context)
//! and shared with every pipeline it creates, so replacing it takes effect
//! everywhere (last write wins) without a process-wide global.
//!
//! The default sink, [`TracingSink`], forwards messages to `tracing`. The
//! binary installs a `tracing-subscriber` fmt layer via [`init_tracing`].

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,mediagraph_rs=debug";

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Destination for diagnostic messages
///
/// Implementations are called from both the owner thread and pipeline worker
/// threads and must not block for long.
pub trait LogSink: Send + Sync {
    fn println(&self, severity: Severity, message: &str);
}

/// Sink that forwards to the `tracing` macros
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn println(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "mediagraph", "{}", message),
            Severity::Info => tracing::info!(target: "mediagraph", "{}", message),
            Severity::Warning => tracing::warn!(target: "mediagraph", "{}", message),
            Severity::Error => tracing::error!(target: "mediagraph", "{}", message),
        }
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn println(&self, _severity: Severity, _message: &str) {}
}

/// Sink that forwards messages over a bounded channel
///
/// Messages are dropped rather than blocking the caller when the receiver
/// falls behind.
pub struct ChannelSink {
    tx: Sender<(Severity, String)>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, Receiver<(Severity, String)>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn println(&self, severity: Severity, message: &str) {
        let _ = self.tx.try_send((severity, message.to_string()));
    }
}

/// Shared, replaceable handle onto a [`LogSink`]
#[derive(Clone)]
pub struct Logger {
    sink: Arc<RwLock<Arc<dyn LogSink>>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink: Arc::new(RwLock::new(sink)),
        }
    }

    /// Replace the sink for this logger and every clone of it
    pub fn set_sink(&self, sink: Arc<dyn LogSink>) {
        match self.sink.write() {
            Ok(mut guard) => *guard = sink,
            Err(poisoned) => *poisoned.into_inner() = sink,
        }
    }

    pub fn log(&self, severity: Severity, message: impl AsRef<str>) {
        let sink = match self.sink.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        sink.println(severity, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Severity::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Severity::Error, message);
    }
}

/// Install the global `tracing` subscriber used by [`TracingSink`]
///
/// Console output honours `RUST_LOG`, falling back to `default_filter`. When
/// `log_dir` is set, output is also written to a daily-rolling file; the
/// returned guard must be kept alive to flush it.
pub fn init_tracing(
    default_filter: &str,
    log_dir: Option<&Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mediagraph.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init();
            None
        }
    }
}
