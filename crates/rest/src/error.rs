//! Error types for the Bulk Submit provider API.
//!
//! This module defines the error type used by the REST layer, with automatic
//! conversion to FHIR OperationOutcome responses.
//!
//! # Error Mapping
//!
//! Engine errors from `helios-submit` are mapped to HTTP status codes and
//! FHIR issue codes:
//!
//! | Submit Error | HTTP Status | FHIR Issue Code |
//! |--------------|-------------|-----------------|
//! | ManifestNotFound | 404 | not-found |
//! | ManifestIndexOutOfRange | 404 | not-found |
//! | DuplicateManifest | 409 | duplicate |
//! | InvalidManifestState | 409 | conflict |
//! | InvalidState | 409 | conflict |
//! | StatusLocationUnavailable | 502 | transient |
//!
//! Failures reported by a destination server during a protocol exchange are
//! not errors at this layer: they are recorded in the submission's activity
//! log and the handler still answers with the updated submission.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_submit::SubmitError;
use std::fmt;

/// The primary error type for REST API operations.
#[derive(Debug)]
pub enum RestError {
    /// Addressed entity not found (HTTP 404).
    NotFound {
        /// The kind of entity (e.g., "Submission").
        resource_type: String,
        /// The id, URL or index used to address it.
        id: String,
    },

    /// Bad request - malformed body or invalid field (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// A manifest with the same URL is already registered (HTTP 409).
    Duplicate {
        /// Error message.
        message: String,
    },

    /// The operation is not allowed in the current state (HTTP 409).
    Conflict {
        /// Error message.
        message: String,
    },

    /// The destination did not answer as required (HTTP 502).
    BadGateway {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl RestError {
    /// Shorthand for a missing submission.
    pub fn submission_not_found(id: &str) -> Self {
        RestError::NotFound {
            resource_type: "Submission".to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a bad request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            message: message.into(),
        }
    }

    /// Returns the HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::Duplicate { .. } | RestError::Conflict { .. } => StatusCode::CONFLICT,
            RestError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { resource_type, id } => {
                write!(f, "Resource not found: {}/{}", resource_type, id)
            }
            RestError::BadRequest { message } => {
                write!(f, "Bad request: {}", message)
            }
            RestError::Duplicate { message } => {
                write!(f, "Duplicate: {}", message)
            }
            RestError::Conflict { message } => {
                write!(f, "Conflict: {}", message)
            }
            RestError::BadGateway { message } => {
                write!(f, "Bad gateway: {}", message)
            }
            RestError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RestError {}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, details) = match &self {
            RestError::NotFound { resource_type, id } => (
                "not-found",
                format!("{} {} not found", resource_type, id),
            ),
            RestError::BadRequest { message } => ("invalid", message.clone()),
            RestError::Duplicate { message } => ("duplicate", message.clone()),
            RestError::Conflict { message } => ("conflict", message.clone()),
            RestError::BadGateway { message } => ("transient", message.clone()),
            RestError::InternalError { message } => ("exception", message.clone()),
        };

        let operation_outcome = create_operation_outcome("error", code, &details);
        (status, Json(operation_outcome)).into_response()
    }
}

/// Creates a FHIR OperationOutcome resource.
///
/// # Arguments
///
/// * `severity` - The issue severity (fatal, error, warning, information)
/// * `code` - The FHIR issue code
/// * `details` - Human-readable details
fn create_operation_outcome(severity: &str, code: &str, details: &str) -> serde_json::Value {
    serde_json::json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": severity,
            "code": code,
            "details": {
                "text": details
            }
        }]
    })
}

impl From<SubmitError> for RestError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ManifestNotFound { manifest_url } => RestError::NotFound {
                resource_type: "Manifest".to_string(),
                id: manifest_url,
            },
            SubmitError::ManifestIndexOutOfRange { index, .. } => RestError::NotFound {
                resource_type: "Manifest".to_string(),
                id: index.to_string(),
            },
            SubmitError::DuplicateManifest { .. } => RestError::Duplicate {
                message: err.to_string(),
            },
            SubmitError::InvalidManifestState { .. }
            | SubmitError::InvalidState { .. }
            | SubmitError::DestinationLocked { .. } => {
                RestError::Conflict {
                    message: err.to_string(),
                }
            }
            SubmitError::StatusLocationUnavailable { .. } => RestError::BadGateway {
                message: err.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for RestError {
    fn from(rejection: JsonRejection) -> Self {
        RestError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::BadRequest {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;
