//! Bulk Submit provider route configuration.

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::handlers;
use crate::state::AppState;

/// Creates all provider API routes.
///
/// # Routes
///
/// ## Probes and hosting
/// - `GET /health` - Health check
/// - `GET /_liveness` - Liveness probe
/// - `GET /api/manifests/empty` - Empty manifest used when aborting
///
/// ## Submissions
/// - `GET /api/submissions` - List
/// - `POST /api/submissions` - Create
/// - `GET /api/submissions/{id}` - Read
/// - `PUT /api/submissions/{id}` - Update
/// - `DELETE /api/submissions/{id}` - Delete
/// - `POST /api/submissions/{id}/complete` - Mark complete at the destination
/// - `POST /api/submissions/{id}/abort` - Abort at the destination
/// - `POST /api/submissions/{id}/submit-manifest` - Submit a manifest by URL
///
/// ## Manifests
/// - `POST /api/submissions/{id}/manifests` - Add
/// - `PUT /api/submissions/{id}/manifests/{index}` - Update
/// - `DELETE /api/submissions/{id}/manifests/{index}` - Remove
/// - `POST /api/submissions/{id}/manifests/{index}/submit` - Submit
/// - `POST /api/submissions/{id}/manifests/{index}/replace` - Replace
/// - `POST /api/submissions/{id}/manifests/{index}/abort` - Abort
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Probes and hosting
        .route("/health", get(handlers::health_handler))
        .route("/_liveness", get(handlers::liveness_handler))
        .route("/api/manifests/empty", get(handlers::empty_manifest_handler))
        // Submissions
        .route(
            "/api/submissions",
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route(
            "/api/submissions/{id}",
            get(handlers::read_handler)
                .put(handlers::update_handler)
                .delete(handlers::delete_handler),
        )
        .route(
            "/api/submissions/{id}/complete",
            post(handlers::complete_handler),
        )
        .route("/api/submissions/{id}/abort", post(handlers::abort_handler))
        .route(
            "/api/submissions/{id}/submit-manifest",
            post(handlers::submit_manifest_handler),
        )
        // Manifests
        .route(
            "/api/submissions/{id}/manifests",
            post(handlers::add_manifest_handler),
        )
        .route(
            "/api/submissions/{id}/manifests/{index}",
            put(handlers::update_manifest_handler).delete(handlers::remove_manifest_handler),
        )
        .route(
            "/api/submissions/{id}/manifests/{index}/submit",
            post(handlers::submit_manifest_at_handler),
        )
        .route(
            "/api/submissions/{id}/manifests/{index}/replace",
            post(handlers::replace_manifest_handler),
        )
        .route(
            "/api/submissions/{id}/manifests/{index}/abort",
            post(handlers::abort_manifest_handler),
        )
        // State
        .with_state(state)
}
