//! HTTP request/response capture subsystem.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → middleware/request_log.rs (request id, handler, path, method, client IP)
//!     → capture.rs (content_type.rs policy, parse params, restore body)
//!     → handler chain (may attach HandlerErrors)
//!     → recorder.rs (tee response body, count bytes)
//!     → body complete → one RequestLog → LogSink
//! ```

pub mod capture;
pub mod content_type;
pub mod handler_error;
pub mod middleware;
pub mod recorder;
pub mod server;

pub use handler_error::HandlerErrors;
pub use middleware::{request_logging_middleware, RequestLogState, X_REQUEST_ID};
pub use server::HttpServer;
