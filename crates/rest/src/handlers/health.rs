//! Health check endpoint handlers.
//!
//! Provides simple health check endpoints for monitoring and load balancers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::RestResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - Server is healthy, with the number of tracked submissions
pub async fn health_handler(State(state): State<AppState>) -> RestResult<Response> {
    debug!("Processing health check request");

    let health_response = serde_json::json!({
        "status": "healthy",
        "submissions": state.store().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Handler for a liveness probe.
///
/// # HTTP Request
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}
