//! Error types for the submission engine.
//!
//! Only domain validation failures are errors here. Protocol and network
//! failures reported by the destination are captured by the
//! [`RequestTracer`](crate::tracer::RequestTracer) and written to the
//! submission's activity log instead; they never surface as `Err`.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::manifest::ManifestStatus;
use crate::submission::SubmissionStatus;

/// Errors produced by submission, manifest and orchestration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// A manifest with the same URL is already registered.
    #[error("manifest already exists in this submission: {manifest_url}")]
    DuplicateManifest { manifest_url: String },

    /// No manifest with the given URL is registered.
    #[error("manifest with URL {manifest_url:?} not found in this submission")]
    ManifestNotFound { manifest_url: String },

    /// The manifest index does not address a registered manifest.
    #[error("invalid manifest index {index} (submission has {len} manifests)")]
    ManifestIndexOutOfRange { index: usize, len: usize },

    /// The manifest is in a state that does not allow the operation.
    #[error("cannot {operation} manifest {manifest_url:?} with status {status}")]
    InvalidManifestState {
        manifest_url: String,
        operation: &'static str,
        status: ManifestStatus,
    },

    /// The submission is in a state that does not allow the operation.
    #[error("cannot {operation} a submission with status {actual} (expected {expected})")]
    InvalidState {
        operation: &'static str,
        expected: SubmissionStatus,
        actual: SubmissionStatus,
    },

    /// The destination cannot change once it has handed out a status
    /// location.
    #[error("cannot change the destination of a submission already polling {status_location}")]
    DestinationLocked { status_location: String },

    /// The destination did not provide a usable status location.
    #[error("status location unavailable: {message}")]
    StatusLocationUnavailable { message: String },
}

impl SubmitError {
    /// Returns true for errors caused by the caller addressing something
    /// that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ManifestNotFound { .. } | Self::ManifestIndexOutOfRange { .. }
        )
    }
}

/// Result type alias for submission operations.
pub type SubmitResult<T> = Result<T, SubmitError>;
