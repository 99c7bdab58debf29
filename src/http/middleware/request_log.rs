//! Request/response logging middleware.
//! Emits one access log entry per request through the injected sink.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::{HeaderMap, HeaderName, Request},
    middleware::Next,
    response::Response,
};

use crate::config::CaptureConfig;
use crate::http::capture::capture_request;
use crate::http::content_type::{self, media_type_of, ContentKind, BINARY_DATA};
use crate::http::handler_error::HandlerErrors;
use crate::http::recorder::{Recorded, RecordingBody};
use crate::observability::entry::RequestLog;
use crate::observability::logging::LogSink;

/// Default request id header.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// State required for request logging.
#[derive(Clone)]
pub struct RequestLogState {
    sink: Arc<dyn LogSink>,
    config: Arc<CaptureConfig>,
    request_id_header: HeaderName,
}

impl RequestLogState {
    pub fn new(sink: Arc<dyn LogSink>, config: CaptureConfig) -> Self {
        let request_id_header = HeaderName::from_bytes(config.request_id_header.as_bytes())
            .unwrap_or(X_REQUEST_ID);
        Self {
            sink,
            config: Arc::new(config),
            request_id_header,
        }
    }
}

pub async fn request_logging_middleware(
    State(state): State<RequestLogState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    // 1. Request metadata
    let request_id = header_str(request.headers(), &state.request_id_header).to_string();
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let client_ip = client_ip(&request, state.config.trust_forwarded_headers);

    // 2. Parameters, with the body put back for the handler
    let (request, params) = capture_request(request, &state.config).await;

    // 3. Handler chain
    let response = next.run(request).await;

    // 4. Response metadata
    let status = response.status().as_u16();
    let errors = response
        .extensions()
        .get::<HandlerErrors>()
        .map(ToString::to_string)
        .unwrap_or_default();
    let media_type = media_type_of(response.headers());
    let kind = ContentKind::classify(&media_type);
    let retain = kind.is_text().then_some(state.config.max_body_bytes);

    // 5. Emit once the body has streamed out
    let sink = state.sink.clone();
    let (parts, body) = response.into_parts();
    let body = RecordingBody::new(body, retain, move |recorded| {
        let entry = RequestLog {
            request_id,
            handler,
            path,
            method,
            params,
            client_ip,
            status,
            errors,
            response_data: describe_response(kind, &media_type, &recorded),
            response_size: recorded.size,
            elapsed: start.elapsed(),
        };
        sink.record(&entry);
    });

    Response::from_parts(parts, Body::new(body))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// First forwarded address, then `X-Real-Ip`, then the peer address.
fn client_ip(request: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let headers = request.headers();
        let forwarded = header_str(headers, &HeaderName::from_static("x-forwarded-for"))
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        let real_ip = header_str(headers, &HeaderName::from_static("x-real-ip")).trim();

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn describe_response(kind: ContentKind, media_type: &str, recorded: &Recorded) -> String {
    match kind {
        _ if kind.is_text() && recorded.truncated => content_type::too_large(recorded.size),
        _ if kind.is_text() => String::from_utf8_lossy(&recorded.body).into_owned(),
        ContentKind::Binary => BINARY_DATA.to_string(),
        _ => content_type::unsupported(media_type),
    }
}
