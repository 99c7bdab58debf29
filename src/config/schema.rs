//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logger and rotation settings.
    pub logging: LoggingConfig,

    /// Request/response capture settings.
    pub capture: CaptureConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level directive (trace, debug, info, warn, error, or an `EnvFilter` string).
    pub level: String,

    /// Mirror every line to stdout.
    pub console: bool,

    /// Rolling file sink.
    pub file: LogFileConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: LogFileConfig::default(),
        }
    }
}

/// Rotation policy for the log file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogFileConfig {
    /// Path of the active log file. Backups are written next to it.
    pub path: PathBuf,

    /// Size in megabytes at which the file is rotated (0 = 100 MB).
    pub max_size_mb: u64,

    /// Number of rotated files to keep (0 = keep all).
    pub max_backups: usize,

    /// Days to keep rotated files (0 = no age limit).
    pub max_age_days: u64,

    /// Gzip rotated files.
    pub compress: bool,

    /// Use local time instead of UTC in backup file names.
    pub local_time: bool,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/access.log"),
            max_size_mb: 100,
            max_backups: 10,
            max_age_days: 30,
            compress: false,
            local_time: false,
        }
    }
}

/// Request/response capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Header carrying the caller-supplied request id.
    pub request_id_header: String,

    /// Largest body (in bytes) that is buffered for the log entry.
    pub max_body_bytes: usize,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-Ip` when present.
    pub trust_forwarded_headers: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            request_id_header: "x-request-id".to_string(),
            max_body_bytes: 1024 * 1024,
            trust_forwarded_headers: true,
        }
    }
}
