//! HTTP middleware.

pub mod request_log;

pub use request_log::{request_logging_middleware, RequestLogState, X_REQUEST_ID};
