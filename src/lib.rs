//! HTTP request/response logging interceptor.
//!
//! Captures request metadata and parameters, lets the handler chain run on
//! the untouched request, records the response as it streams out, and writes
//! one entry per request to a rotating log file and the console.

pub mod config;
pub mod http;
pub mod observability;

pub use config::ServiceConfig;
pub use http::{request_logging_middleware, HttpServer, RequestLogState};
pub use observability::{init_logger, LogSink, Logger};
