//! Documents this server hosts for destination servers.

use axum::{Json, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use tracing::debug;

/// Handler for the empty manifest.
///
/// Aborting a manifest replaces it with this document, which lists no
/// output files. Destinations fetch it like any other manifest.
///
/// # HTTP Request
///
/// `GET [base]/api/manifests/empty`
///
/// # Response
///
/// ```json
/// { "transactionTime": "2026-01-01T00:00:00.000Z", "requiresAccessToken": false, "output": [] }
/// ```
pub async fn empty_manifest_handler() -> impl IntoResponse {
    debug!("Serving empty manifest");

    Json(serde_json::json!({
        "transactionTime": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "requiresAccessToken": false,
        "output": []
    }))
}
