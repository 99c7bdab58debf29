//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demonstration handlers
//! - Wire up middleware (request logging, timeout)
//! - Bind server to listener
//! - Graceful shutdown on Ctrl+C

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Form, Query},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServiceConfig;
use crate::http::handler_error::HandlerErrors;
use crate::http::middleware::{request_logging_middleware, RequestLogState};
use crate::observability::logging::LogSink;

/// Error returned by the demonstration handlers.
///
/// The message is sent to the client and recorded for the access log.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "error": self.message }))).into_response();
        HandlerErrors::attach(&mut response, self.message);
        response
    }
}

/// HTTP server hosting routes behind the request logging middleware.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server writing access entries to `sink`.
    pub fn new(config: ServiceConfig, sink: Arc<dyn LogSink>) -> Self {
        let state = RequestLogState::new(sink, config.capture.clone());
        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: RequestLogState) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/echo/json", post(echo_json))
            .route("/echo/form", post(echo_form))
            .route("/upload", post(upload))
            .route("/search", get(search))
            .route("/fail", get(fail))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(from_fn_with_state(state, request_logging_middleware))
    }

    /// The configured router, for driving the server in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn echo_json(Json(value): Json<Value>) -> Json<Value> {
    Json(value)
}

async fn echo_form(Form(fields): Form<BTreeMap<String, String>>) -> Json<BTreeMap<String, String>> {
    Json(fields)
}

async fn upload(body: Bytes) -> Json<Value> {
    Json(json!({ "received": body.len() }))
}

async fn search(Query(params): Query<BTreeMap<String, String>>) -> Json<Value> {
    Json(json!({ "query": params, "results": [] }))
}

async fn fail() -> Result<Json<Value>, ApiError> {
    Err(ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "simulated failure",
    ))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
