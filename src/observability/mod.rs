//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! request logging middleware
//!     → entry.rs (RequestLog, fixed-order text block)
//!     → logging.rs (Logger: LogSink, one encoder, two sinks)
//!         → stdout
//!         → tracing_appender worker → rotation.rs (RollingFile)
//! ```
//!
//! # Design Decisions
//! - One human-readable multi-line entry per request
//! - The request id is supplied by the caller, never generated
//! - No metrics or span correlation

pub mod entry;
pub mod logging;
pub mod rotation;

pub use entry::{FormFields, RequestLog, RequestParams};
pub use logging::{init_logger, LogSink, Logger, LoggingError};
pub use rotation::RollingFile;
