//! Structured logging.
//!
//! # Responsibilities
//! - Build the logger: a rolling file sink and a console sink sharing one line encoder
//! - Hand out a cloneable handle that request middleware writes through
//! - Optionally install that handle as the process-wide default
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Human-readable lines: ISO-8601 timestamp, upper-case level, caller, message
//! - File writes go through a `tracing_appender` worker; requests never wait on disk
//! - The logger is passed to the middleware, not looked up from a global

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tracing::dispatcher::{self, Dispatch, SetGlobalDefaultError};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, format, time::FormatTime, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::observability::entry::RequestLog;
use crate::observability::rotation::RollingFile;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Error type for logger setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a global logger is already installed")]
    GlobalAlreadySet(#[from] SetGlobalDefaultError),
}

/// Destination for completed access log entries.
pub trait LogSink: Send + Sync + 'static {
    fn record(&self, entry: &RequestLog);
}

/// Handle to the configured logger.
///
/// Cloning is cheap. Pending file lines are flushed when the last clone drops.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    _guard: Arc<WorkerGuard>,
}

impl Logger {
    /// Run `f` with this logger as the current default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the default for the whole process.
    ///
    /// Can only succeed once per process.
    pub fn install_global(&self) -> Result<(), LoggingError> {
        dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }
}

impl LogSink for Logger {
    fn record(&self, entry: &RequestLog) {
        self.in_scope(|| tracing::info!("{}", entry));
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// ISO-8601 local timestamp with milliseconds and UTC offset.
#[derive(Debug, Clone, Copy, Default)]
struct Iso8601Time;

impl FormatTime for Iso8601Time {
    fn format_time(&self, w: &mut format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// The shared line encoder, bound to one writer.
fn encoder<S, W>(writer: W) -> fmt::Layer<S, format::DefaultFields, format::Format<format::Full, Iso8601Time>, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_timer(Iso8601Time)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(writer)
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Build the logger described by `config`.
///
/// A log directory that cannot be created does not abort startup; the failure
/// is reported through the new logger's console sink and file writes fail
/// quietly until the directory appears.
pub fn init_logger(config: &LoggingConfig) -> Logger {
    build_logger(config, std::io::stdout)
}

fn build_logger<C>(config: &LoggingConfig, console: C) -> Logger
where
    C: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let dir_result = ensure_dir(&config.file.path);

    let (file_writer, guard) = tracing_appender::non_blocking(RollingFile::new(&config.file));

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = config.console.then(|| encoder(console));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(encoder(file_writer))
        .with(console_layer);

    let logger = Logger {
        dispatch: Dispatch::new(subscriber),
        _guard: Arc::new(guard),
    };

    if let Err(e) = dir_result {
        logger.in_scope(|| {
            tracing::error!(
                path = %config.file.path.display(),
                error = %e,
                "Failed to create log directory"
            )
        });
    }

    logger
}

/// In-memory writer for asserting on formatted output.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedWriter(Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedWriter {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl<'a> MakeWriter<'a> for CapturedWriter {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
