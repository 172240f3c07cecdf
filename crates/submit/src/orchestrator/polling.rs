//! Status polling.
//!
//! After a manifest is accepted, the orchestrator asks the destination for a
//! status location once per submission (`$bulk-submit-status`, memoized on
//! the submission) and then runs one background task that polls that
//! location until the destination returns a final result or an unexpected
//! response.

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use super::SubmissionOrchestrator;
use crate::error::{SubmitError, SubmitResult};
use crate::log::{LogLevel, RecordOptions};
use crate::manifest::ManifestStatus;
use crate::protocol::{
    BULK_SUBMIT_STATUS_OPERATION, CONTENT_LOCATION_HEADER, NDJSON_OUTPUT_FORMAT,
    PROGRESS_HEADER, Parameters, operation_url, parse_progress,
};
use crate::submission::{Submission, SubmissionStatus};
use crate::tracer::OutboundRequest;

/// Outcome of a single status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    /// The destination is still working; check again later.
    InProgress,
    /// The destination returned the final result.
    Complete,
    /// The destination answered unexpectedly or not at all.
    Failed,
}

impl StatusCheck {
    /// Returns true if polling should stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl SubmissionOrchestrator {
    /// Returns the submission's status location, asking the destination for
    /// it on first use.
    ///
    /// Concurrent callers share a single kickoff request. A failed kickoff is
    /// not remembered, so the next call tries again.
    pub async fn resolve_status_location(&self, submission: &Submission) -> SubmitResult<String> {
        submission
            .status_location_cell()
            .get_or_try_init(|| self.kickoff_status_request(submission))
            .await
            .cloned()
    }

    /// Starts the poll task unless one is already running.
    ///
    /// Returns true if a new task was started. Failing to obtain a status
    /// location is recorded as a warning and leaves polling off.
    pub async fn arm_polling(&self, submission: &Submission) -> bool {
        if submission.is_polling() {
            return false;
        }

        let location = match self.resolve_status_location(submission).await {
            Ok(location) => location,
            Err(err) => {
                submission.record(
                    "Unable to start status polling",
                    RecordOptions::warn().details(err.to_string()),
                );
                return false;
            }
        };

        let orchestrator = self.clone();
        let target = submission.clone();
        let armed = submission.install_poll_task(move || {
            tokio::spawn(async move { orchestrator.poll_loop(target, location).await })
        });

        if armed {
            info!(submission_id = %submission.id(), "Status polling armed");
        }
        armed
    }

    /// Performs one status check against `location`.
    ///
    /// Requires the submission to be `in-progress`. A `200` stores the result
    /// and sets progress to 100, a `202` updates progress from the
    /// `x-progress` header, anything else marks submitted manifests as
    /// `failed`.
    pub async fn check_status(
        &self,
        submission: &Submission,
        location: &str,
    ) -> SubmitResult<StatusCheck> {
        let status = submission.status();
        if status != SubmissionStatus::InProgress {
            return Err(SubmitError::InvalidState {
                operation: "check the status of",
                expected: SubmissionStatus::InProgress,
                actual: status,
            });
        }

        let trace = self.tracer.send(OutboundRequest::get(location)).await;
        let request = Some(trace.request.clone());
        let response = trace.response.clone();

        match trace.status() {
            Some(200) => {
                let message = format!(
                    "Status: got 200 {}. Submission is now complete!",
                    response
                        .as_ref()
                        .map(|r| r.status_text.as_str())
                        .unwrap_or("OK")
                );
                submission.record(
                    message,
                    RecordOptions::new()
                        .request(request)
                        .response(response.clone()),
                );

                let now = Utc::now();
                let mut state = submission.write();
                state.result = response.map(|r| r.body);
                state.progress = 100.0;
                for manifest in state.manifests.iter_mut() {
                    if manifest.status == ManifestStatus::Submitted {
                        manifest.completed_at = Some(now);
                    }
                }
                Ok(StatusCheck::Complete)
            }
            Some(202) => {
                let progress_header = trace.header(PROGRESS_HEADER).map(str::to_string);
                let message = format!(
                    "Status: {}. Next status check in {} seconds...",
                    progress_header.as_deref().unwrap_or("in-progress"),
                    self.config.poll_interval.as_secs_f64()
                );
                submission.record(
                    message,
                    RecordOptions::new().request(request).response(response),
                );

                if let Some(progress) = progress_header.as_deref().and_then(parse_progress) {
                    submission.write().progress = progress;
                }
                Ok(StatusCheck::InProgress)
            }
            other => {
                let message = match (other, &response) {
                    (Some(status), Some(r)) => format!(
                        "Status: got unexpected response {} {}. Polling will stop.",
                        status, r.status_text
                    ),
                    _ => "Status: got no response. Polling will stop.".to_string(),
                };
                let mut options = RecordOptions::error().request(request).response(response);
                if let Some(error) = &trace.error {
                    options = options.details(error.clone());
                }
                submission.record(message, options);

                let mut state = submission.write();
                for manifest in state.manifests.iter_mut() {
                    if manifest.status == ManifestStatus::Submitted {
                        manifest.status = ManifestStatus::Failed;
                    }
                }
                Ok(StatusCheck::Failed)
            }
        }
    }

    async fn poll_loop(self, submission: Submission, location: String) {
        tokio::time::sleep(self.config.initial_poll_delay).await;
        loop {
            debug!(
                submission_id = %submission.id(),
                location = %location,
                "Checking submission status"
            );
            match self.check_status(&submission, &location).await {
                Ok(StatusCheck::InProgress) => tokio::time::sleep(self.config.poll_interval).await,
                Ok(_) => break,
                Err(err) => {
                    submission.record(
                        "Status check failed. Polling will stop.",
                        RecordOptions::error().details(err.to_string()),
                    );
                    break;
                }
            }
        }
        debug!(submission_id = %submission.id(), "Status polling finished");
    }

    async fn kickoff_status_request(&self, submission: &Submission) -> SubmitResult<String> {
        let (base_url, submitter) = {
            let state = submission.read();
            (state.destination_base_url.clone(), state.submitter.clone())
        };

        let body = Parameters::for_submission(&submitter, submission.id())
            .string("_outputFormat", NDJSON_OUTPUT_FORMAT)
            .to_value();

        let trace = self
            .tracer
            .send(
                OutboundRequest::post(operation_url(&base_url, BULK_SUBMIT_STATUS_OPERATION))
                    .header("Content-Type", "application/json")
                    .header("Accept", "application/fhir+json")
                    .header("Prefer", "respond-async")
                    .json(&body),
            )
            .await;

        let options = RecordOptions::new()
            .request(Some(trace.request.clone()))
            .response(trace.response.clone());

        if let Some(error) = &trace.error {
            submission.record(
                "Bulk status kick-off request failed",
                options
                    .level(LogLevel::Error)
                    .details(format!("{}. Look at the response for more information.", error)),
            );
            return Err(SubmitError::StatusLocationUnavailable {
                message: error.clone(),
            });
        }
        submission.record("Bulk status kick-off request", options);

        let location = trace
            .header(CONTENT_LOCATION_HEADER)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SubmitError::StatusLocationUnavailable {
                message: "no content-location header in response".to_string(),
            })?;

        resolve_location(&base_url, location.trim())
    }
}

/// Resolves a possibly relative status location against the destination.
fn resolve_location(base_url: &str, location: &str) -> SubmitResult<String> {
    if let Ok(absolute) = Url::parse(location) {
        return Ok(absolute.to_string());
    }

    let base = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|base| base.join(location))
        .map(|url| url.to_string())
        .map_err(|err| SubmitError::StatusLocationUnavailable {
            message: format!("invalid content-location {:?}: {}", location, err),
        })
}
