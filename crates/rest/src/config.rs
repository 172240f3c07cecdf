//! Server configuration for the Bulk Submit provider API.
//!
//! This module provides configuration types for the REST server, supporting
//! both programmatic configuration and environment variable overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SUBMIT_SERVER_PORT` | 3000 | Server port |
//! | `SUBMIT_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `SUBMIT_LOG_LEVEL` | info | Log level |
//! | `SUBMIT_MAX_BODY_SIZE` | 1048576 | Max request body (bytes) |
//! | `SUBMIT_REQUEST_TIMEOUT` | 60 | Inbound request timeout (seconds) |
//! | `SUBMIT_ENABLE_CORS` | true | Enable CORS |
//! | `SUBMIT_CORS_ORIGINS` | * | Allowed origins |
//! | `SUBMIT_CORS_METHODS` | GET,POST,PUT,DELETE,OPTIONS | Allowed methods |
//! | `SUBMIT_CORS_HEADERS` | Content-Type,Accept,Authorization | Allowed headers |
//! | `SUBMIT_BASE_URL` | http://localhost:3000 | Public base URL of this server |
//! | `SUBMIT_OUTBOUND_TIMEOUT` | 30 | Timeout for requests to destinations (seconds) |
//! | `SUBMIT_INITIAL_POLL_DELAY_MS` | 1000 | Delay before the first status check |
//! | `SUBMIT_POLL_INTERVAL_MS` | 5000 | Delay between status checks |
//! | `SUBMIT_SEED_EXAMPLE` | false | Create an example submission at startup |
//! | `SUBMIT_EXAMPLE_DESTINATION` | http://localhost:3333 | Destination of the example submission |
//!
//! # Example
//!
//! ```rust
//! use helios_submit_rest::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 8080,
//!     host: "0.0.0.0".to_string(),
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use clap::Parser;
use helios_submit::SubmitConfig;
use url::Url;

/// Server configuration for the Bulk Submit provider API.
///
/// This struct can be constructed from environment variables using [`ServerConfig::from_env`],
/// from command line arguments using [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "bulk-submit-provider")]
#[command(about = "Bulk Data Submit provider (sender side)")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "SUBMIT_SERVER_PORT", default_value = "3000")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "SUBMIT_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "SUBMIT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "SUBMIT_MAX_BODY_SIZE", default_value = "1048576")]
    pub max_body_size: usize,

    /// Inbound request timeout in seconds.
    #[arg(long, env = "SUBMIT_REQUEST_TIMEOUT", default_value = "60")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "SUBMIT_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "SUBMIT_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "SUBMIT_CORS_METHODS",
        default_value = "GET,POST,PUT,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "SUBMIT_CORS_HEADERS",
        default_value = "Content-Type,Accept,Authorization"
    )]
    pub cors_headers: String,

    /// Public base URL of this server (used for the empty manifest link).
    #[arg(long, env = "SUBMIT_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Timeout for requests to destination servers, in seconds.
    #[arg(long, env = "SUBMIT_OUTBOUND_TIMEOUT", default_value = "30")]
    pub outbound_timeout: u64,

    /// Delay before the first status check, in milliseconds.
    #[arg(long, env = "SUBMIT_INITIAL_POLL_DELAY_MS", default_value = "1000")]
    pub initial_poll_delay_ms: u64,

    /// Delay between status checks, in milliseconds.
    #[arg(long, env = "SUBMIT_POLL_INTERVAL_MS", default_value = "5000")]
    pub poll_interval_ms: u64,

    /// Create an example submission at startup.
    #[arg(long, env = "SUBMIT_SEED_EXAMPLE", default_value = "false")]
    pub seed_example: bool,

    /// Destination base URL of the example submission.
    #[arg(
        long,
        env = "SUBMIT_EXAMPLE_DESTINATION",
        default_value = "http://localhost:3333"
    )]
    pub example_destination: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            request_timeout: 60,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Accept,Authorization".to_string(),
            base_url: "http://localhost:3000".to_string(),
            outbound_timeout: 30,
            initial_poll_delay_ms: 1000,
            poll_interval_ms: 5000,
            seed_example: false,
            example_destination: "http://localhost:3333".to_string(),
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        // Try to parse from environment, falling back to defaults
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the engine configuration derived from these settings.
    pub fn submit_config(&self) -> SubmitConfig {
        SubmitConfig {
            public_base_url: self.base_url.trim_end_matches('/').to_string(),
            initial_poll_delay: Duration::from_millis(self.initial_poll_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_secs(self.outbound_timeout),
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.outbound_timeout == 0 {
            errors.push("Outbound timeout cannot be 0".to_string());
        }

        if self.poll_interval_ms == 0 {
            errors.push("Poll interval cannot be 0".to_string());
        }

        if !is_http_url(&self.base_url) {
            errors.push(format!("Base URL is not an http(s) URL: {}", self.base_url));
        }

        if self.seed_example && !is_http_url(&self.example_destination) {
            errors.push(format!(
                "Example destination is not an http(s) URL: {}",
                self.example_destination
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0, disables CORS and shortens polling delays.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            max_body_size: 1024 * 1024,
            request_timeout: 5, // Shorter timeout for tests
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            base_url: "http://provider.test".to_string(),
            outbound_timeout: 2,
            initial_poll_delay_ms: 10,
            poll_interval_ms: 20,
            seed_example: false,
            example_destination: "http://localhost:3333".to_string(),
        }
    }
}

/// Returns true if `value` parses as an absolute http or https URL.
pub(crate) fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
