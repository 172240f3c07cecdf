//! Submission handlers.
//!
//! CRUD over the submission store plus the submission-level protocol
//! operations. Every handler that touches a submission answers with its
//! serialized view, including after a failed exchange: destination failures
//! are reported through the activity log, not the HTTP status.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use helios_submit::{NewSubmission, Submission, SubmissionUpdate, SubmissionView};
use serde::Deserialize;
use tracing::{debug, info};

use super::{require_http_url, run_detached};
use crate::error::{RestError, RestResult};
use crate::state::AppState;

/// Body of `POST /api/submissions/{id}/submit-manifest`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitManifestRequest {
    /// URL of a manifest already registered on the submission.
    pub manifest_url: String,
}

/// Handler for listing submissions.
///
/// # HTTP Request
///
/// `GET [base]/api/submissions`
///
/// # Response
///
/// - `200 OK` - Array of submissions, oldest first
pub async fn list_handler(State(state): State<AppState>) -> Json<Vec<SubmissionView>> {
    debug!("Processing list submissions request");

    let views: Vec<SubmissionView> = state
        .store()
        .list()
        .iter()
        .map(Submission::to_view)
        .collect();
    Json(views)
}

/// Handler for creating a submission.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions`
///
/// ```json
/// { "destinationBaseUrl": "https://dest.example/fhir", "name": "Quarterly export" }
/// ```
///
/// # Response
///
/// - `201 Created` - The new submission, with a `Location` header
/// - `400 Bad Request` - Missing or malformed `destinationBaseUrl`
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewSubmission>, JsonRejection>,
) -> RestResult<Response> {
    let Json(input) = payload?;
    debug!(destination = %input.destination_base_url, "Processing create submission request");

    require_http_url("destinationBaseUrl", &input.destination_base_url)?;

    let submission = Submission::new(input);
    state.store().save(submission.clone());
    info!(submission_id = %submission.id(), "Submission created");

    let location = format!("/api/submissions/{}", submission.id());
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(submission.to_view()),
    )
        .into_response())
}

/// Handler for reading a submission.
///
/// # HTTP Request
///
/// `GET [base]/api/submissions/{id}`
///
/// # Response
///
/// - `200 OK` - The submission
/// - `404 Not Found` - Unknown id
pub async fn read_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, "Processing read submission request");

    let submission = state.submission(&id)?;
    Ok(Json(submission.to_view()))
}

/// Handler for updating a submission's name, destination or submitter.
///
/// Absent fields are left unchanged.
///
/// # HTTP Request
///
/// `PUT [base]/api/submissions/{id}`
///
/// # Response
///
/// - `200 OK` - The updated submission
/// - `400 Bad Request` - Malformed body or destination URL
/// - `404 Not Found` - Unknown id
/// - `409 Conflict` - Destination change after status polling began
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SubmissionUpdate>, JsonRejection>,
) -> RestResult<Json<SubmissionView>> {
    let Json(update) = payload?;
    debug!(submission_id = %id, "Processing update submission request");

    if let Some(url) = &update.destination_base_url {
        require_http_url("destinationBaseUrl", url)?;
    }

    let submission = state.submission(&id)?;
    submission.update(update)?;
    Ok(Json(submission.to_view()))
}

/// Handler for deleting a submission.
///
/// Any running status poll for the submission is cancelled.
///
/// # HTTP Request
///
/// `DELETE [base]/api/submissions/{id}`
///
/// # Response
///
/// - `204 No Content` - Submission deleted
/// - `404 Not Found` - Unknown id
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RestResult<StatusCode> {
    debug!(submission_id = %id, "Processing delete submission request");

    state
        .store()
        .remove(&id)
        .ok_or_else(|| RestError::submission_not_found(&id))?;

    info!(submission_id = %id, "Submission deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for marking a submission as complete at the destination.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/complete`
pub async fn complete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, "Processing complete submission request");

    let submission = state.submission(&id)?;
    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    let trace = run_detached(async move { orchestrator.complete(&target).await }).await?;

    debug!(submission_id = %id, error = ?trace.error, "Complete exchange finished");
    Ok(Json(submission.to_view()))
}

/// Handler for aborting a whole submission at the destination.
///
/// On success, in-flight manifests become `aborted` and polling stops.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/abort`
pub async fn abort_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RestResult<Json<SubmissionView>> {
    debug!(submission_id = %id, "Processing abort submission request");

    let submission = state.submission(&id)?;
    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    let trace = run_detached(async move { orchestrator.abort(&target).await }).await?;

    debug!(submission_id = %id, error = ?trace.error, "Abort exchange finished");
    Ok(Json(submission.to_view()))
}

/// Handler for submitting a registered manifest, addressed by URL.
///
/// # HTTP Request
///
/// `POST [base]/api/submissions/{id}/submit-manifest`
///
/// ```json
/// { "manifestUrl": "https://source.example/manifests/1" }
/// ```
///
/// # Response
///
/// - `200 OK` - The submission after the exchange
/// - `400 Bad Request` - Missing `manifestUrl`
/// - `404 Not Found` - Unknown submission or manifest
/// - `409 Conflict` - Manifest already being submitted
pub async fn submit_manifest_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitManifestRequest>, JsonRejection>,
) -> RestResult<Json<SubmissionView>> {
    let Json(request) = payload?;
    debug!(
        submission_id = %id,
        manifest_url = %request.manifest_url,
        "Processing submit manifest request"
    );

    let submission = state.submission(&id)?;
    let orchestrator = state.orchestrator().clone();
    let target = submission.clone();
    run_detached(async move {
        orchestrator
            .submit_manifest(&target, &request.manifest_url)
            .await
    })
    .await??;

    Ok(Json(submission.to_view()))
}
