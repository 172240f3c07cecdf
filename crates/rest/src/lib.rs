//! # helios-submit-rest - Bulk Submit Provider API
//!
//! This crate exposes the [`helios_submit`] engine over HTTP. A client (for
//! example a browser UI) creates submissions, attaches manifests, and drives
//! the Bulk Data Submit protocol against a destination server through the
//! routes below. Every route that touches a submission answers with the
//! serialized submission, including its activity log, so the client can show
//! exactly what was exchanged with the destination.
//!
//! ## Features
//!
//! - **Submission CRUD**: In-memory store of submissions keyed by id
//! - **Protocol Operations**: Submit, abort and replace manifests; complete or abort a submission
//! - **Status Polling**: Started automatically after the first accepted manifest
//! - **Empty Manifest Hosting**: The document destinations fetch when a manifest is aborted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use helios_submit_rest::{create_app, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Configure the server
//!     let config = ServerConfig::default();
//!
//!     // Create the Axum application
//!     let app = create_app(config)?;
//!
//!     // Start the server
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Operation | HTTP Method | URL Pattern |
//! |-----------|-------------|-------------|
//! | list | GET | `/api/submissions` |
//! | create | POST | `/api/submissions` |
//! | read | GET | `/api/submissions/[id]` |
//! | update | PUT | `/api/submissions/[id]` |
//! | delete | DELETE | `/api/submissions/[id]` |
//! | complete | POST | `/api/submissions/[id]/complete` |
//! | abort | POST | `/api/submissions/[id]/abort` |
//! | submit by URL | POST | `/api/submissions/[id]/submit-manifest` |
//! | add manifest | POST | `/api/submissions/[id]/manifests` |
//! | update manifest | PUT | `/api/submissions/[id]/manifests/[index]` |
//! | remove manifest | DELETE | `/api/submissions/[id]/manifests/[index]` |
//! | submit manifest | POST | `/api/submissions/[id]/manifests/[index]/submit` |
//! | replace manifest | POST | `/api/submissions/[id]/manifests/[index]/replace` |
//! | abort manifest | POST | `/api/submissions/[id]/manifests/[index]/abort` |
//! | empty manifest | GET | `/api/manifests/empty` |
//!
//! ## Error Responses
//!
//! Validation and state errors are returned as FHIR `OperationOutcome`
//! resources (see [`error`]). A destination that rejects a request does not
//! produce an error response: the failure is recorded in the submission's
//! log and the submission is returned as usual.

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, http::StatusCode};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with an empty submission store.
///
/// For control over the store (for example to seed submissions), build an
/// [`AppState`] and use [`create_app_with_state`].
///
/// # Errors
///
/// Fails if the outbound HTTP client cannot be built.
pub fn create_app(config: ServerConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(config)?;
    Ok(create_app_with_state(state))
}

/// Creates the Axum application around existing state.
///
/// This function sets up all provider routes and the middleware stack
/// described by the state's configuration.
///
/// # Example
///
/// ```rust,no_run
/// use helios_submit_rest::{AppState, ServerConfig, create_app_with_state};
///
/// # fn main() -> anyhow::Result<()> {
/// let state = AppState::from_config(ServerConfig::default())?;
/// let app = create_app_with_state(state.clone());
/// # Ok(())
/// # }
/// ```
pub fn create_app_with_state(state: AppState) -> Router {
    let config = state.config().clone();
    info!(
        base_url = %config.base_url,
        cors = config.enable_cors,
        "Creating Bulk Submit provider API"
    );

    // Build the router with all provider routes
    let router = routing::api_routes::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_submit_rest={level},helios_submit={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
