//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are returned,
//! not just the first.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,

    #[error("logging.level `{0}` is not a valid filter directive")]
    LogLevel(String),

    #[error("logging.file.path `{0}` does not name a file")]
    LogPath(String),

    #[error("capture.request_id_header `{0}` is not a valid header name")]
    RequestIdHeader(String),

    #[error("capture.max_body_bytes must be greater than zero")]
    MaxBodyBytes,
}

/// Check a configuration, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    if EnvFilter::try_new(&config.logging.level).is_err() {
        errors.push(ValidationError::LogLevel(config.logging.level.clone()));
    }

    if config.logging.file.path.file_name().is_none() {
        errors.push(ValidationError::LogPath(
            config.logging.file.path.display().to_string(),
        ));
    }

    if HeaderName::from_bytes(config.capture.request_id_header.as_bytes()).is_err() {
        errors.push(ValidationError::RequestIdHeader(
            config.capture.request_id_header.clone(),
        ));
    }

    if config.capture.max_body_bytes == 0 {
        errors.push(ValidationError::MaxBodyBytes);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
