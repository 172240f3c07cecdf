//! Bulk Data Submit wire vocabulary.
//!
//! Operation names, header names, status codings and the FHIR `Parameters`
//! body used by every request to the destination.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::submission::Submitter;

/// Operation that carries submission requests.
pub const BULK_SUBMIT_OPERATION: &str = "$bulk-submit";

/// Operation that starts an asynchronous status request.
pub const BULK_SUBMIT_STATUS_OPERATION: &str = "$bulk-submit-status";

/// Code system of submission status codings.
pub const SUBMISSION_STATUS_SYSTEM: &str =
    "http://hl7.org/fhir/uv/bulkdata/ValueSet/submission-status";

/// Header carrying progress on a `202` status response.
pub const PROGRESS_HEADER: &str = "x-progress";

/// Header carrying the status location on a kickoff response.
pub const CONTENT_LOCATION_HEADER: &str = "content-location";

/// Output format requested from the status endpoint.
pub const NDJSON_OUTPUT_FORMAT: &str = "application/fhir+ndjson";

/// Path, relative to the public base URL, of the empty manifest document.
pub const EMPTY_MANIFEST_PATH: &str = "/api/manifests/empty";

static PROGRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(\.\d+)?)%").expect("progress pattern is a valid regex")
});

/// The `submissionStatus` values a sender can assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStatusCode {
    /// More manifests may follow.
    InProgress,
    /// No more manifests will be sent.
    Complete,
    /// The submission is withdrawn.
    Aborted,
}

impl SubmissionStatusCode {
    /// Returns the coding's `code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }

    /// Returns the coding as JSON.
    pub fn coding(&self) -> Value {
        json!({ "system": SUBMISSION_STATUS_SYSTEM, "code": self.code() })
    }
}

/// Builder for a FHIR `Parameters` resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    parameter: Vec<Value>,
}

impl Parameters {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the parameter list every request to the destination shares.
    pub fn for_submission(submitter: &Submitter, submission_id: &str) -> Self {
        Self::new()
            .identifier("submitter", submitter)
            .string("submissionId", submission_id)
    }

    /// Appends a `valueIdentifier` parameter.
    pub fn identifier(mut self, name: &str, submitter: &Submitter) -> Self {
        self.parameter.push(json!({
            "name": name,
            "valueIdentifier": { "system": submitter.system, "value": submitter.value },
        }));
        self
    }

    /// Appends a `valueString` parameter.
    pub fn string(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.parameter
            .push(json!({ "name": name, "valueString": value.as_ref() }));
        self
    }

    /// Appends a `submissionStatus` coding parameter.
    pub fn status(mut self, code: SubmissionStatusCode) -> Self {
        self.parameter
            .push(json!({ "name": "submissionStatus", "valueCoding": code.coding() }));
        self
    }

    /// Appends several parameters.
    pub fn extend(mut self, parameters: Parameters) -> Self {
        self.parameter.extend(parameters.parameter);
        self
    }

    /// Returns the parameter names in order.
    pub fn names(&self) -> Vec<&str> {
        self.parameter
            .iter()
            .filter_map(|p| p.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Renders the `Parameters` resource.
    pub fn to_value(&self) -> Value {
        json!({ "resourceType": "Parameters", "parameter": self.parameter })
    }
}

/// Joins a base URL and an operation name.
pub fn operation_url(base_url: &str, operation: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), operation)
}

/// Extracts a percentage from an `x-progress` value such as `"42.5% complete"`.
pub fn parse_progress(header: &str) -> Option<f64> {
    PROGRESS_PATTERN
        .captures(header)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("42.5% complete"), Some(42.5));
        assert_eq!(parse_progress("10%"), Some(10.0));
        assert_eq!(parse_progress("processing 3 of 7 (43%)"), Some(43.0));
        assert_eq!(parse_progress("almost done"), None);
        assert_eq!(parse_progress("42.5"), None);
    }

    #[test]
    fn test_operation_url() {
        assert_eq!(
            operation_url("https://dest.example/fhir", BULK_SUBMIT_OPERATION),
            "https://dest.example/fhir/$bulk-submit"
        );
        assert_eq!(
            operation_url("https://dest.example/fhir/", BULK_SUBMIT_STATUS_OPERATION),
            "https://dest.example/fhir/$bulk-submit-status"
        );
    }

    #[test]
    fn test_parameters_shape() {
        let params = Parameters::for_submission(&Submitter::default(), "s1")
            .status(SubmissionStatusCode::Complete)
            .to_value();

        assert_eq!(params["resourceType"], "Parameters");
        assert_eq!(params["parameter"][0]["name"], "submitter");
        assert_eq!(
            params["parameter"][0]["valueIdentifier"]["value"],
            "example-submitter"
        );
        assert_eq!(params["parameter"][1]["valueString"], "s1");
        assert_eq!(
            params["parameter"][2]["valueCoding"],
            json!({ "system": SUBMISSION_STATUS_SYSTEM, "code": "complete" })
        );
    }

    #[test]
    fn test_extend_keeps_order() {
        let params = Parameters::for_submission(&Submitter::default(), "s1").extend(
            Parameters::new()
                .status(SubmissionStatusCode::InProgress)
                .string("manifestUrl", "m1"),
        );
        assert_eq!(
            params.names(),
            vec!["submitter", "submissionId", "submissionStatus", "manifestUrl"]
        );
    }
}
