//! Request logging server.
//!
//! Hosts demonstration routes behind the request logging middleware.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request_log middleware ──▶ handler
//!                          │
//!     Client Response      ▼
//!     ◀────────────── recording body ──▶ Logger ──┬──▶ stdout
//!                                                 └──▶ rolling file
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use request_logger::config::{load_config, ServiceConfig};
use request_logger::http::HttpServer;
use request_logger::observability::init_logger;

#[derive(Parser)]
#[command(name = "request-logger")]
#[command(about = "HTTP server with request/response access logging", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    // Initialize logging before anything else reports
    let logger = init_logger(&config.logging);
    logger.install_global()?;

    tracing::info!("request-logger v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        log_file = %config.logging.file.path.display(),
        max_size_mb = config.logging.file.max_size_mb,
        max_backups = config.logging.file.max_backups,
        max_age_days = config.logging.file.max_age_days,
        compress = config.logging.file.compress,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let server = HttpServer::new(config, Arc::new(logger.clone()));
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
