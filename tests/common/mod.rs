//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    middleware::from_fn_with_state,
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use request_logger::config::CaptureConfig;
use request_logger::http::{request_logging_middleware, RequestLogState};
use request_logger::observability::{LogSink, RequestLog};

/// Sink that keeps every entry in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<RequestLog>>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<RequestLog> {
        self.entries.lock().unwrap().clone()
    }

    /// The only entry recorded so far.
    pub fn single(&self) -> RequestLog {
        let entries = self.entries();
        assert_eq!(entries.len(), 1, "expected exactly one entry, got {:?}", entries);
        entries.into_iter().next().unwrap()
    }
}

impl LogSink for MemorySink {
    fn record(&self, entry: &RequestLog) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Put the request logging middleware in front of `routes`.
#[allow(dead_code)]
pub fn with_logging(routes: Router, sink: &MemorySink, config: CaptureConfig) -> Router {
    let state = RequestLogState::new(Arc::new(sink.clone()), config);
    routes.layer(from_fn_with_state(state, request_logging_middleware))
}

/// Drive one request through `app` and read the whole response body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}
