//! Submissions and their derived status.
//!
//! A [`Submission`] is a cheaply clonable handle onto shared state. Every
//! clone observes the same manifests, log and poll task, which lets the
//! store, the REST layer and the background poll loop work on one instance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{SubmitError, SubmitResult};
use crate::log::{ActivityLog, LogEntry, LogLevel, RecordOptions};
use crate::manifest::{
    ManifestRegistry, ManifestStatus, ManifestUpdate, NewManifest, SubmissionManifest,
};

/// Name given to submissions created without one.
pub const DEFAULT_SUBMISSION_NAME: &str = "Unnamed Bulk Submission";

/// Identity of the party submitting data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Submitter {
    /// Identifier system.
    pub system: String,
    /// Identifier value.
    pub value: String,
}

impl Submitter {
    /// Creates a submitter identity.
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }
}

impl Default for Submitter {
    fn default() -> Self {
        Self::new("http://example.org/fhir/submitter-codes", "example-submitter")
    }
}

/// Status of a submission, derived from its manifests and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    /// Nothing has been sent, or everything sent was withdrawn.
    NotStarted,
    /// At least one manifest is with the destination.
    InProgress,
    /// At least one manifest failed and none is in flight.
    Failed,
    /// The destination returned a final result.
    Complete,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Failed => write!(f, "failed"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Derives a submission's status.
///
/// A stored result wins; otherwise any in-flight manifest means
/// `in-progress`, any failed manifest means `failed`, and everything else is
/// `not-started`. The order of manifests does not matter.
pub fn derive_status<'a, I>(manifests: I, has_result: bool) -> SubmissionStatus
where
    I: IntoIterator<Item = &'a SubmissionManifest>,
{
    if has_result {
        return SubmissionStatus::Complete;
    }

    let mut any_failed = false;
    for manifest in manifests {
        if manifest.status.is_in_flight() {
            return SubmissionStatus::InProgress;
        }
        any_failed |= manifest.status == ManifestStatus::Failed;
    }

    if any_failed {
        SubmissionStatus::Failed
    } else {
        SubmissionStatus::NotStarted
    }
}

/// Input for creating a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    /// Base URL of the destination server.
    pub destination_base_url: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Submitter identity.
    #[serde(default)]
    pub submitter: Option<Submitter>,
}

impl NewSubmission {
    /// Creates input for a submission to `destination_base_url`.
    pub fn new(destination_base_url: impl Into<String>) -> Self {
        Self {
            destination_base_url: destination_base_url.into(),
            name: None,
            submitter: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the submitter identity.
    pub fn with_submitter(mut self, submitter: Submitter) -> Self {
        self.submitter = Some(submitter);
        self
    }
}

/// Partial update of a submission's editable attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpdate {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New destination base URL.
    #[serde(default)]
    pub destination_base_url: Option<String>,
    /// New submitter identity.
    #[serde(default)]
    pub submitter: Option<Submitter>,
}

/// Serializable snapshot of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    /// Submission id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Base URL of the destination server.
    pub destination_base_url: String,
    /// Submitter identity.
    pub submitter: Submitter,
    /// Derived status.
    pub status: SubmissionStatus,
    /// Progress percentage, 0 to 100.
    pub progress: f64,
    /// Registered manifests.
    pub manifests: Vec<SubmissionManifest>,
    /// Activity log, oldest first.
    pub log: Vec<LogEntry>,
    /// Final result returned by the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Mutable part of a submission.
#[derive(Debug)]
pub(crate) struct SubmissionState {
    pub(crate) name: String,
    pub(crate) destination_base_url: String,
    pub(crate) submitter: Submitter,
    pub(crate) manifests: ManifestRegistry,
    pub(crate) log: ActivityLog,
    pub(crate) progress: f64,
    pub(crate) result: Option<Value>,
}

impl SubmissionState {
    pub(crate) fn status(&self) -> SubmissionStatus {
        derive_status(&self.manifests, self.result.is_some())
    }
}

#[derive(Debug)]
struct SubmissionInner {
    id: String,
    created_at: DateTime<Utc>,
    state: RwLock<SubmissionState>,
    status_location: OnceCell<String>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to a bulk submission.
#[derive(Debug, Clone)]
pub struct Submission {
    inner: Arc<SubmissionInner>,
}

impl Submission {
    /// Creates a submission with a generated id.
    pub fn new(input: NewSubmission) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), input)
    }

    /// Creates a submission with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, input: NewSubmission) -> Self {
        let state = SubmissionState {
            name: input
                .name
                .unwrap_or_else(|| DEFAULT_SUBMISSION_NAME.to_string()),
            destination_base_url: input.destination_base_url,
            submitter: input.submitter.unwrap_or_default(),
            manifests: ManifestRegistry::new(),
            log: ActivityLog::new(),
            progress: 0.0,
            result: None,
        };

        Self {
            inner: Arc::new(SubmissionInner {
                id: id.into(),
                created_at: Utc::now(),
                state: RwLock::new(state),
                status_location: OnceCell::new(),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Returns the submission id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Returns the display name.
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Returns the destination base URL.
    pub fn destination_base_url(&self) -> String {
        self.read().destination_base_url.clone()
    }

    /// Returns the submitter identity.
    pub fn submitter(&self) -> Submitter {
        self.read().submitter.clone()
    }

    /// Returns the progress percentage.
    pub fn progress(&self) -> f64 {
        self.read().progress
    }

    /// Returns the final result, if the destination reported one.
    pub fn result(&self) -> Option<Value> {
        self.read().result.clone()
    }

    /// Returns the derived status.
    pub fn status(&self) -> SubmissionStatus {
        self.read().status()
    }

    /// Returns a copy of all manifests.
    pub fn manifests(&self) -> Vec<SubmissionManifest> {
        self.read().manifests.iter().cloned().collect()
    }

    /// Returns a copy of the manifest at `index`.
    pub fn manifest_at(&self, index: usize) -> SubmitResult<SubmissionManifest> {
        self.read().manifests.get(index).cloned()
    }

    /// Returns a copy of the activity log.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.read().log.entries().to_vec()
    }

    /// Returns the status location once the kickoff succeeded.
    pub fn status_location(&self) -> Option<String> {
        self.inner.status_location.get().cloned()
    }

    /// Applies a partial update of name, destination and submitter.
    ///
    /// The destination is fixed once a status location has been obtained
    /// from it; changing it then fails and nothing is applied.
    pub fn update(&self, update: SubmissionUpdate) -> SubmitResult<()> {
        let mut state = self.write();
        if let (Some(url), Some(location)) = (
            &update.destination_base_url,
            self.inner.status_location.get(),
        ) {
            if *url != state.destination_base_url {
                return Err(SubmitError::DestinationLocked {
                    status_location: location.clone(),
                });
            }
        }
        if let Some(name) = update.name {
            state.name = name;
        }
        if let Some(url) = update.destination_base_url {
            state.destination_base_url = url;
        }
        if let Some(submitter) = update.submitter {
            state.submitter = submitter;
        }
        Ok(())
    }

    /// Registers a manifest. Duplicate URLs are rejected.
    pub fn add_manifest(&self, manifest: NewManifest) -> SubmitResult<SubmissionManifest> {
        self.write().manifests.add(manifest).cloned()
    }

    /// Edits the manifest at `index`.
    pub fn update_manifest_at(
        &self,
        index: usize,
        update: ManifestUpdate,
    ) -> SubmitResult<SubmissionManifest> {
        self.write().manifests.update_at(index, update).cloned()
    }

    /// Removes the manifest at `index`.
    pub fn remove_manifest_at(&self, index: usize) -> SubmitResult<SubmissionManifest> {
        self.write().manifests.remove_at(index)
    }

    /// Removes the manifest with the given URL.
    pub fn remove_manifest(&self, manifest_url: &str) -> SubmitResult<SubmissionManifest> {
        self.write().manifests.remove(manifest_url)
    }

    /// Appends a record to the activity log and mirrors it to `tracing`.
    pub fn record(&self, message: impl Into<String>, options: RecordOptions) {
        let message = message.into();
        let id = self.id();
        match options.severity() {
            LogLevel::Info => info!(submission_id = %id, "{}", message),
            LogLevel::Warn => warn!(submission_id = %id, details = ?options.details, "{}", message),
            LogLevel::Error => {
                error!(submission_id = %id, details = ?options.details, "{}", message)
            }
        }
        self.write().log.record(message, options);
    }

    /// Builds a serializable snapshot.
    pub fn to_view(&self) -> SubmissionView {
        let state = self.read();
        SubmissionView {
            id: self.inner.id.clone(),
            name: state.name.clone(),
            created_at: self.inner.created_at,
            destination_base_url: state.destination_base_url.clone(),
            submitter: state.submitter.clone(),
            status: state.status(),
            progress: state.progress,
            manifests: state.manifests.iter().cloned().collect(),
            log: state.log.entries().to_vec(),
            result: state.result.clone(),
        }
    }

    /// Returns true while a poll task is alive.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poll_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops the poll task. Returns true if a live task was stopped.
    pub fn cancel_polling(&self) -> bool {
        match self.inner.poll_task.lock().take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                info!(submission_id = %self.id(), "Status polling cancelled");
                true
            }
            _ => false,
        }
    }

    /// Installs a poll task unless one is already alive. `spawn` is only
    /// invoked when the slot is free.
    pub(crate) fn install_poll_task<F>(&self, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut slot = self.inner.poll_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        *slot = Some(spawn());
        true
    }

    /// Returns true if both handles refer to the same submission instance.
    pub(crate) fn ptr_eq(&self, other: &Submission) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn status_location_cell(&self) -> &OnceCell<String> {
        &self.inner.status_location
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SubmissionState> {
        self.inner.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, SubmissionState> {
        self.inner.state.write()
    }
}

impl Serialize for Submission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_view().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [ManifestStatus; 6] = [
        ManifestStatus::NotStarted,
        ManifestStatus::Submitting,
        ManifestStatus::Submitted,
        ManifestStatus::Aborted,
        ManifestStatus::Failed,
        ManifestStatus::Replaced,
    ];

    fn manifests(statuses: &[ManifestStatus]) -> Vec<SubmissionManifest> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut m = SubmissionManifest::new(format!("m{i}"), "https://src.example");
                m.status = *status;
                m
            })
            .collect()
    }

    fn expected(statuses: &[ManifestStatus]) -> SubmissionStatus {
        if statuses.iter().any(|s| {
            matches!(s, ManifestStatus::Submitting | ManifestStatus::Submitted)
        }) {
            SubmissionStatus::InProgress
        } else if statuses.contains(&ManifestStatus::Failed) {
            SubmissionStatus::Failed
        } else {
            SubmissionStatus::NotStarted
        }
    }

    #[test]
    fn test_derive_status_over_all_combinations() {
        assert_eq!(derive_status(&manifests(&[]), false), SubmissionStatus::NotStarted);

        for a in ALL_STATUSES {
            for b in ALL_STATUSES {
                for c in ALL_STATUSES {
                    let statuses = [a, b, c];
                    let forward = manifests(&statuses);
                    let mut reversed = forward.clone();
                    reversed.reverse();
                    let rotated: Vec<_> = [&forward[1..], &forward[..1]].concat();

                    let want = expected(&statuses);
                    assert_eq!(derive_status(&forward, false), want, "{statuses:?}");
                    assert_eq!(derive_status(&reversed, false), want, "{statuses:?}");
                    assert_eq!(derive_status(&rotated, false), want, "{statuses:?}");
                    assert_eq!(derive_status(&forward, true), SubmissionStatus::Complete);
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let submission = Submission::new(NewSubmission::new("https://dest.example/fhir"));
        assert_eq!(submission.name(), DEFAULT_SUBMISSION_NAME);
        assert_eq!(submission.submitter(), Submitter::default());
        assert_eq!(submission.status(), SubmissionStatus::NotStarted);
        assert_eq!(submission.progress(), 0.0);
        assert!(Uuid::parse_str(submission.id()).is_ok());
        assert!(!submission.is_polling());
    }

    #[test]
    fn test_clones_share_state() {
        let submission = Submission::with_id("s1", NewSubmission::new("https://dest.example"));
        let clone = submission.clone();
        clone
            .add_manifest(NewManifest::new("m1", "https://src.example"))
            .unwrap();
        assert_eq!(submission.manifests().len(), 1);
    }

    #[test]
    fn test_update_is_partial() {
        let submission = Submission::new(
            NewSubmission::new("https://dest.example").with_name("Original"),
        );
        submission
            .update(SubmissionUpdate {
                destination_base_url: Some("https://other.example".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(submission.name(), "Original");
        assert_eq!(submission.destination_base_url(), "https://other.example");
    }

    #[test]
    fn test_destination_is_locked_once_status_location_is_known() {
        let submission = Submission::new(NewSubmission::new("https://dest.example"));
        submission
            .status_location_cell()
            .set("https://dest.example/status/1".to_string())
            .unwrap();

        let err = submission
            .update(SubmissionUpdate {
                name: Some("Renamed".to_string()),
                destination_base_url: Some("https://other.example".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::DestinationLocked {
                status_location: "https://dest.example/status/1".to_string()
            }
        );
        assert_eq!(submission.name(), "Unnamed Bulk Submission");
        assert_eq!(submission.destination_base_url(), "https://dest.example");

        // Resending the current destination is not a change.
        submission
            .update(SubmissionUpdate {
                name: Some("Renamed".to_string()),
                destination_base_url: Some("https://dest.example".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(submission.name(), "Renamed");
    }

    #[test]
    fn test_duplicate_manifest_is_rejected() {
        let submission = Submission::new(NewSubmission::new("https://dest.example"));
        submission
            .add_manifest(NewManifest::new("m1", "https://src.example"))
            .unwrap();
        let before = submission.manifests();

        let err = submission
            .add_manifest(NewManifest::new("m1", "https://elsewhere.example"))
            .unwrap_err();

        assert!(matches!(err, SubmitError::DuplicateManifest { .. }));
        assert_eq!(submission.manifests(), before);
    }

    #[test]
    fn test_record_appends_to_log() {
        let submission = Submission::new(NewSubmission::new("https://dest.example"));
        submission.record("first", RecordOptions::new());
        submission.record("first", RecordOptions::new());
        submission.record("second", RecordOptions::warn());

        let log = submission.log_entries();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].count, 2);
        assert_eq!(log[1].level, LogLevel::Warn);
    }

    #[test]
    fn test_view_serialization() {
        let submission = Submission::with_id("s1", NewSubmission::new("https://dest.example"));
        let value = serde_json::to_value(&submission).unwrap();

        assert_eq!(value["id"], "s1");
        assert_eq!(value["status"], "not-started");
        assert_eq!(value["destinationBaseUrl"], "https://dest.example");
        assert_eq!(value["submitter"]["value"], "example-submitter");
        assert!(value["manifests"].as_array().unwrap().is_empty());
        assert!(value.get("result").is_none());
    }

    #[tokio::test]
    async fn test_install_poll_task_is_exclusive() {
        let submission = Submission::new(NewSubmission::new("https://dest.example"));

        let installed = submission.install_poll_task(|| {
            tokio::spawn(async { tokio::time::sleep(std::time::Duration::from_secs(60)).await })
        });
        assert!(installed);
        assert!(submission.is_polling());

        let mut called = false;
        let second = submission.install_poll_task(|| {
            called = true;
            tokio::spawn(async {})
        });
        assert!(!second);
        assert!(!called);

        assert!(submission.cancel_polling());
        assert!(!submission.is_polling());
        assert!(!submission.cancel_polling());
    }
}
