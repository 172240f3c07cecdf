//! Manifest handlers.
//!
//! Manifests are addressed by their zero-based position in the submission's
//! manifest list.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use helios_submit::{ManifestUpdate, NewManifest, SubmissionView};
use serde::Deserialize;
use tracing::{debug, info};

use super::{require_http_url, run_detached};
use crate::error::RestResult;
use crate::state::AppState;

/// Body of `POST /api/submissions/{id}/manifests/{index}/replace`.
#[derive(Debug, Deserialize)]
pub struct ReplaceManifestRequest {
    /// URL of the replacement manifest.
    #[serde(rename = "newManifestUrl")]
    pub new_manifest_url: String,
    /// FHIR base URL of the replacement. Defaults to that of the replaced manifest.
    #[serde(default, rename = "FHIRBaseUrl")]
    pub fhir_base_url: Option<String>,
}

/// Handler for adding a manifest to a submission.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/manifests`
///
/// ```json
/// { "manifestUrl": "https://source.example/manifests/1", "FHIRBaseUrl": "https://source.example/fhir" }
/// ```
///
/// # Response
///
/// - `200 OK` - The submission with the manifest appended
/// - `400 Bad Request` - Missing or malformed URLs
/// - `404 Not Found` - Unknown submission
/// - `409 Conflict` - A manifest with this URL is already registered
pub async fn add_manifest_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NewManifest>, JsonRejection>,
) -> RestResult<Json<SubmissionView>> {
    let Json(manifest) = payload?;
    debug!(submission_id = %id, manifest_url = %manifest.url, "Processing add manifest request");

    require_http_url("manifestUrl", &manifest.url)?;
    require_http_url("FHIRBaseUrl", &manifest.fhir_base_url)?;

    let submission = state.submission(&id)?;
    submission.add_manifest(manifest)?;
    Ok(Json(submission.to_view()))
}

/// Handler for editing a manifest's URLs.
///
/// Only manifests that are not with the destination can be edited.
///
/// # HTTP Request
///
/// `PUT [base]/api/submissions/{id}/manifests/{index}`
///
/// # Response
///
/// - `200 OK` - The updated submission
/// - `404 Not Found` - Unknown submission or index
/// - `409 Conflict` - Manifest is in flight, or the new URL is taken
pub async fn update_manifest_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    payload: Result<Json<ManifestUpdate>, JsonRejection>,
) -> RestResult<Json<SubmissionView>> {
    let Json(update) = payload?;
    debug!(submission_id = %id, index, "Processing update manifest request");

    if let Some(url) = &update.url {
        require_http_url("manifestUrl", url)?;
    }
    if let Some(url) = &update.fhir_base_url {
        require_http_url("FHIRBaseUrl", url)?;
    }

    let submission = state.submission(&id)?;
    submission.update_manifest_at(index, update)?;
    Ok(Json(submission.to_view()))
}

/// Handler for removing a manifest.
///
/// # HTTP Request
///
/// `DELETE [base]/api/submissions/{id}/manifests/{index}`
///
/// # Response
///
/// - `200 OK` - The submission without the manifest
/// - `404 Not Found` - Unknown submission or index
/// - `409 Conflict` - Manifest is with the destination
pub async fn remove_manifest_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, index, "Processing remove manifest request");

    let submission = state.submission(&id)?;
    let removed = submission.remove_manifest_at(index)?;
    info!(submission_id = %id, manifest_url = %removed.manifest_url, "Manifest removed");
    Ok(Json(submission.to_view()))
}

/// Handler for submitting the manifest at `index`.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/manifests/{index}/submit`
pub async fn submit_manifest_at_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, index, "Processing submit manifest request");

    let submission = state.submission(&id)?;
    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    run_detached(async move { orchestrator.submit_manifest_at(&target, index).await }).await??;

    Ok(Json(submission.to_view()))
}

/// Handler for replacing the manifest at `index` with a new one.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/manifests/{index}/replace`
///
/// ```json
/// { "newManifestUrl": "https://source.example/manifests/2" }
/// ```
///
/// # Response
///
/// - `200 OK` - The submission after the exchange
/// - `400 Bad Request` - Missing or malformed `newManifestUrl`
/// - `404 Not Found` - Unknown submission or index
/// - `409 Conflict` - The new URL belongs to another manifest
pub async fn replace_manifest_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    payload: Result<Json<ReplaceManifestRequest>, JsonRejection>,
) -> RestResult<Json<SubmissionView>> {
    let Json(request) = payload?;
    debug!(
        submission_id = %id,
        index,
        new_manifest_url = %request.new_manifest_url,
        "Processing replace manifest request"
    );

    require_http_url("newManifestUrl", &request.new_manifest_url)?;
    if let Some(url) = &request.fhir_base_url {
        require_http_url("FHIRBaseUrl", url)?;
    }

    let submission = state.submission(&id)?;
    let current = submission.manifest_at(index)?;
    let replacement = NewManifest::new(
        request.new_manifest_url,
        request.fhir_base_url.unwrap_or(current.fhir_base_url),
    );

    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    run_detached(async move {
        orchestrator
            .replace_manifest_at(&target, index, replacement)
            .await
    })
    .await??;

    Ok(Json(submission.to_view()))
}

/// Handler for aborting the manifest at `index`.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/manifests/{index}/abort`
///
/// # Response
///
/// - `200 OK` - The submission after the exchange
/// - `404 Not Found` - Unknown submission or index
/// - `409 Conflict` - Manifest is not with the destination
pub async fn abort_manifest_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, index, "Processing abort manifest request");

    let submission = state.submission(&id)?;
    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    run_detached(async move { orchestrator.abort_manifest_at(&target, index).await }).await??;

    Ok(Json(submission.to_view()))
}
