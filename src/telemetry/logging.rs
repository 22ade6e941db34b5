//! Logging configuration and initialization
//!
//! Structured console logging via tracing. `log` macro output from the
//! capture and processing threads is bridged into the same subscriber.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Use JSON format for logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

/// Initialize the logging system with the given configuration.
///
/// # Environment Variables
///
/// - `FACECAST_LOG`: Set log level filter (e.g., "debug", "info,facecast=debug")
/// - `FACECAST_LOG_FORMAT`: Set to "json" for JSON output
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Check FACECAST_LOG first, then fall back to RUST_LOG, then to config default
    let env_filter = EnvFilter::try_from_env("FACECAST_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = std::env::var("FACECAST_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(config.json_format);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if use_json {
        // JSON format for production/log aggregation
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        subscriber.with(json_layer).try_init()?;
    } else {
        // Compact console format for development
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .compact();
        subscriber.with(console_layer).try_init()?;
    }

    tracing::info!(
        target: "facecast",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        "Logging initialized"
    );

    Ok(())
}

/// Initialize logging from environment with sensible defaults.
pub fn init_logging_default() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(&LogConfig::default())
}
