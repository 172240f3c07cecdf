//! Protocol operations on a submission.
//!
//! Every operation follows the same shape: validate against the current
//! state, release the lock, perform one `$bulk-submit` exchange through the
//! [`RequestTracer`], record it in the activity log, then re-lock and apply
//! the state transition only if the destination accepted the request.
//! Manifests are looked up again by URL after the exchange, never by index.
//!
//! Network and protocol failures are not returned as errors; they show up as
//! `error` entries in the submission's log and leave the state untouched.

mod polling;

pub use polling::StatusCheck;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::SubmitConfig;
use crate::error::{SubmitError, SubmitResult};
use crate::log::RecordOptions;
use crate::manifest::{ManifestStatus, NewManifest, SubmissionManifest};
use crate::protocol::{BULK_SUBMIT_OPERATION, Parameters, SubmissionStatusCode, operation_url};
use crate::submission::Submission;
use crate::tracer::{OutboundRequest, RequestTracer, TraceResult};

/// Drives protocol exchanges and status polling for submissions.
///
/// The orchestrator holds no per-submission state; everything lives on the
/// [`Submission`] handle passed to each call. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct SubmissionOrchestrator {
    tracer: RequestTracer,
    config: Arc<SubmitConfig>,
}

impl SubmissionOrchestrator {
    /// Creates an orchestrator over an existing tracer.
    pub fn new(tracer: RequestTracer, config: SubmitConfig) -> Self {
        Self {
            tracer,
            config: Arc::new(config),
        }
    }

    /// Creates an orchestrator with a reqwest-backed tracer using the
    /// configured request timeout.
    pub fn from_config(config: SubmitConfig) -> Result<Self, reqwest::Error> {
        let tracer = RequestTracer::with_timeout(config.request_timeout)?;
        Ok(Self::new(tracer, config))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SubmitConfig {
        &self.config
    }

    /// Returns the tracer.
    pub fn tracer(&self) -> &RequestTracer {
        &self.tracer
    }

    /// Sends a manifest to the destination.
    ///
    /// The manifest is `submitting` while the exchange is in flight. On
    /// success it becomes `submitted` and status polling is armed; on failure
    /// its previous status is restored. If the manifest left `submitting`
    /// meanwhile (an abort was accepted), it is left untouched.
    pub async fn submit_manifest(
        &self,
        submission: &Submission,
        manifest_url: &str,
    ) -> SubmitResult<TraceResult> {
        let (previous, fhir_base_url) = {
            let mut state = submission.write();
            let manifest = state
                .manifests
                .find_mut(manifest_url)
                .ok_or_else(|| not_found(manifest_url))?;
            if manifest.status == ManifestStatus::Submitting {
                return Err(SubmitError::InvalidManifestState {
                    manifest_url: manifest_url.to_string(),
                    operation: "submit",
                    status: manifest.status,
                });
            }
            let previous = manifest.status;
            manifest.status = ManifestStatus::Submitting;
            (previous, manifest.fhir_base_url.clone())
        };

        submission.record(
            format!("Submitting manifest \"{}\"...", manifest_url),
            RecordOptions::new(),
        );

        let trace = self
            .bulk_submit_request(
                submission,
                Parameters::new()
                    .status(SubmissionStatusCode::InProgress)
                    .string("manifestUrl", manifest_url)
                    .string("FHIRBaseUrl", &fhir_base_url),
            )
            .await;

        // An abort accepted while the exchange was in flight wins.
        let settled = {
            let mut state = submission.write();
            match state.manifests.find_mut(manifest_url) {
                Some(manifest) if manifest.status == ManifestStatus::Submitting => {
                    if trace.is_success() {
                        manifest.status = ManifestStatus::Submitted;
                        manifest.started_at = Some(Utc::now());
                    } else {
                        manifest.status = previous;
                    }
                    true
                }
                _ => false,
            }
        };

        if !settled {
            debug!(
                submission_id = %submission.id(),
                manifest_url,
                "Manifest changed during submit, leaving it as is"
            );
        } else if trace.is_success() {
            info!(submission_id = %submission.id(), manifest_url, "Manifest submitted");
            self.arm_polling(submission).await;
        }

        Ok(trace)
    }

    /// Sends the manifest at `index` to the destination.
    pub async fn submit_manifest_at(
        &self,
        submission: &Submission,
        index: usize,
    ) -> SubmitResult<TraceResult> {
        let manifest = submission.manifest_at(index)?;
        self.submit_manifest(submission, &manifest.manifest_url).await
    }

    /// Withdraws a manifest by replacing it with the empty manifest.
    ///
    /// Only `submitting` and `submitted` manifests can be aborted.
    pub async fn abort_manifest(
        &self,
        submission: &Submission,
        manifest_url: &str,
    ) -> SubmitResult<TraceResult> {
        let manifest = find_manifest(submission, manifest_url)?;
        if !manifest.status.is_abortable() {
            return Err(SubmitError::InvalidManifestState {
                manifest_url: manifest_url.to_string(),
                operation: "abort",
                status: manifest.status,
            });
        }

        submission.record(
            format!("Aborting manifest \"{}\"...", manifest_url),
            RecordOptions::warn(),
        );

        let trace = self
            .bulk_submit_request(
                submission,
                Parameters::new()
                    .status(SubmissionStatusCode::InProgress)
                    .string("manifestUrl", self.config.empty_manifest_url())
                    .string("FHIRBaseUrl", &manifest.fhir_base_url)
                    .string("replacesManifestUrl", manifest_url),
            )
            .await;

        if trace.is_success() {
            let mut state = submission.write();
            if let Some(manifest) = state.manifests.find_mut(manifest_url) {
                manifest.status = ManifestStatus::Aborted;
                manifest.completed_at = Some(Utc::now());
            }
        }

        Ok(trace)
    }

    /// Withdraws the manifest at `index`.
    pub async fn abort_manifest_at(
        &self,
        submission: &Submission,
        index: usize,
    ) -> SubmitResult<TraceResult> {
        let manifest = submission.manifest_at(index)?;
        self.abort_manifest(submission, &manifest.manifest_url).await
    }

    /// Replaces a manifest with a new one.
    ///
    /// On success the old manifest becomes `replaced`, the new one is
    /// registered as `submitted`, and status polling is armed.
    pub async fn replace_manifest(
        &self,
        submission: &Submission,
        old_url: &str,
        replacement: NewManifest,
    ) -> SubmitResult<TraceResult> {
        {
            let state = submission.read();
            let old = state
                .manifests
                .find(old_url)
                .ok_or_else(|| not_found(old_url))?;
            if old.status == ManifestStatus::Replaced {
                return Err(SubmitError::InvalidManifestState {
                    manifest_url: old_url.to_string(),
                    operation: "replace",
                    status: old.status,
                });
            }
            if state.manifests.contains(&replacement.url) {
                return Err(SubmitError::DuplicateManifest {
                    manifest_url: replacement.url,
                });
            }
        }

        submission.record(
            format!(
                "Replacing manifest \"{}\" with \"{}\"...",
                old_url, replacement.url
            ),
            RecordOptions::new(),
        );

        let trace = self
            .bulk_submit_request(
                submission,
                Parameters::new()
                    .status(SubmissionStatusCode::InProgress)
                    .string("manifestUrl", &replacement.url)
                    .string("FHIRBaseUrl", &replacement.fhir_base_url)
                    .string("replacesManifestUrl", old_url),
            )
            .await;

        if !trace.is_success() {
            return Ok(trace);
        }

        {
            let now = Utc::now();
            let mut state = submission.write();
            if let Some(old) = state.manifests.find_mut(old_url) {
                old.status = ManifestStatus::Replaced;
                old.completed_at = Some(now);
            }
            match state.manifests.find_mut(&replacement.url) {
                // Registered concurrently while the exchange was in flight.
                Some(existing) => {
                    existing.fhir_base_url = replacement.fhir_base_url;
                    existing.status = ManifestStatus::Submitted;
                    existing.started_at = Some(now);
                }
                None => {
                    let mut manifest =
                        SubmissionManifest::new(replacement.url, replacement.fhir_base_url);
                    manifest.status = ManifestStatus::Submitted;
                    manifest.started_at = Some(now);
                    state.manifests.insert(manifest)?;
                }
            }
        }

        info!(submission_id = %submission.id(), old_url, "Manifest replaced");
        self.arm_polling(submission).await;
        Ok(trace)
    }

    /// Replaces the manifest at `index` with a new one.
    pub async fn replace_manifest_at(
        &self,
        submission: &Submission,
        index: usize,
        replacement: NewManifest,
    ) -> SubmitResult<TraceResult> {
        let manifest = submission.manifest_at(index)?;
        self.replace_manifest(submission, &manifest.manifest_url, replacement)
            .await
    }

    /// Tells the destination that no more manifests will be sent.
    pub async fn complete(&self, submission: &Submission) -> TraceResult {
        submission.record(
            "Marking bulk submission as complete...",
            RecordOptions::new(),
        );
        self.bulk_submit_request(
            submission,
            Parameters::new().status(SubmissionStatusCode::Complete),
        )
        .await
    }

    /// Withdraws the whole submission.
    ///
    /// On success status polling stops and every in-flight manifest becomes
    /// `aborted`.
    pub async fn abort(&self, submission: &Submission) -> TraceResult {
        submission.record(
            "Marking bulk submission as aborted...",
            RecordOptions::warn(),
        );
        let trace = self
            .bulk_submit_request(
                submission,
                Parameters::new().status(SubmissionStatusCode::Aborted),
            )
            .await;

        if trace.is_success() {
            submission.cancel_polling();
            let now = Utc::now();
            let mut state = submission.write();
            for manifest in state.manifests.iter_mut() {
                if manifest.status.is_abortable() {
                    manifest.status = ManifestStatus::Aborted;
                    manifest.completed_at = Some(now);
                }
            }
        }

        trace
    }

    /// Sends one `$bulk-submit` request and records the exchange.
    async fn bulk_submit_request(
        &self,
        submission: &Submission,
        parameters: Parameters,
    ) -> TraceResult {
        let (base_url, submitter) = {
            let state = submission.read();
            (state.destination_base_url.clone(), state.submitter.clone())
        };

        let body = Parameters::for_submission(&submitter, submission.id())
            .extend(parameters)
            .to_value();
        let url = operation_url(&base_url, BULK_SUBMIT_OPERATION);
        debug!(submission_id = %submission.id(), url = %url, "Sending bulk submit request");

        let trace = self
            .tracer
            .send(
                OutboundRequest::post(url)
                    .header("Content-Type", "application/json")
                    .header("Accept", "application/json")
                    .json(&body),
            )
            .await;

        let options = match &trace.error {
            None => RecordOptions::new(),
            Some(error) => RecordOptions::error()
                .details(format!("{}. Look at the response for more information.", error)),
        }
        .request(Some(trace.request.clone()))
        .response(trace.response.clone());

        let message = if trace.is_success() {
            "Bulk Submit request"
        } else {
            "Bulk Submit request failed!"
        };
        submission.record(message, options);

        trace
    }
}

fn not_found(manifest_url: &str) -> SubmitError {
    SubmitError::ManifestNotFound {
        manifest_url: manifest_url.to_string(),
    }
}

fn find_manifest(submission: &Submission, manifest_url: &str) -> SubmitResult<SubmissionManifest> {
    submission
        .read()
        .manifests
        .find(manifest_url)
        .cloned()
        .ok_or_else(|| not_found(manifest_url))
}
