//! Common test utilities for provider API testing.
//!
//! - An in-process [`TestServer`] around the full middleware stack
//! - A `wiremock` destination that speaks the Bulk Submit protocol
//! - Helpers for creating submissions and inspecting responses

#![allow(dead_code)]

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use helios_submit_rest::{AppState, ServerConfig, create_app_with_state};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// FHIR base URL the test manifests were exported from.
pub const SOURCE_FHIR: &str = "https://source.example/fhir";

/// Empty manifest URL under [`ServerConfig::for_testing`].
pub const EMPTY_MANIFEST: &str = "http://provider.test/api/manifests/empty";

/// A provider API under test.
pub struct TestApp {
    /// The in-process server.
    pub server: TestServer,

    /// State shared with the server.
    pub state: AppState,
}

/// Creates a test app with the testing configuration.
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(ServerConfig::for_testing())
}

/// Creates a test app with a custom configuration.
pub fn create_test_app_with_config(config: ServerConfig) -> TestApp {
    let state = AppState::from_config(config).expect("Failed to build app state");
    let app = create_app_with_state(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    TestApp { server, state }
}

// =============================================================================
// Destination
// =============================================================================

/// A destination whose status endpoint keeps answering `202 50%`.
pub async fn destination() -> MockServer {
    destination_with_status(ResponseTemplate::new(202).insert_header("x-progress", "50%")).await
}

/// A destination that accepts every `$bulk-submit` request and answers
/// status checks with `status`.
pub async fn destination_with_status(status: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fhir/$bulk-submit"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fhir/$bulk-submit-status"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("content-location", format!("{}/fhir/status/1", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fhir/status/1"))
        .respond_with(status)
        .mount(&server)
        .await;

    server
}

/// Returns the FHIR base URL of a mock destination.
pub fn destination_url(server: &MockServer) -> String {
    format!("{}/fhir", server.uri())
}

/// Returns the JSON bodies of every `$bulk-submit` request received.
pub async fn bulk_submit_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/fhir/$bulk-submit")
        .map(|request| request.body_json::<Value>().expect("Parameters body"))
        .collect()
}

/// Returns the `valueString` of a named parameter.
pub fn string_parameter<'a>(parameters: &'a Value, name: &str) -> Option<&'a str> {
    parameters["parameter"]
        .as_array()?
        .iter()
        .find(|p| p["name"] == name)?
        .get("valueString")?
        .as_str()
}

/// Returns the `submissionStatus` code of a Parameters body.
pub fn submission_status_code(parameters: &Value) -> Option<&str> {
    parameters["parameter"]
        .as_array()?
        .iter()
        .find(|p| p["name"] == "submissionStatus")?
        .get("valueCoding")?
        .get("code")?
        .as_str()
}

// =============================================================================
// API helpers
// =============================================================================

/// Returns a distinct manifest URL.
pub fn manifest_url(n: usize) -> String {
    format!("https://source.example/manifests/{n}")
}

/// Creates a submission and returns its id.
pub async fn create_submission(server: &TestServer, destination: &str) -> String {
    let response = server
        .post("/api/submissions")
        .json(&json!({ "destinationBaseUrl": destination }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"]
        .as_str()
        .expect("submission id")
        .to_string()
}

/// Adds manifest `n` to a submission.
pub async fn add_manifest(server: &TestServer, id: &str, n: usize) -> TestResponse {
    server
        .post(&format!("/api/submissions/{id}/manifests"))
        .json(&json!({ "manifestUrl": manifest_url(n), "FHIRBaseUrl": SOURCE_FHIR }))
        .await
}

/// Reads a submission.
pub async fn read_submission(server: &TestServer, id: &str) -> Value {
    let response = server.get(&format!("/api/submissions/{id}")).await;
    response.assert_status_ok();
    response.json::<Value>()
}

/// Polls a submission until `done` holds, failing after two seconds.
pub async fn wait_for<F>(server: &TestServer, id: &str, what: &str, done: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let submission = read_submission(server, id).await;
        if done(&submission) {
            return submission;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}: {submission}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Returns the most recent log entry of a serialized submission.
pub fn last_log(submission: &Value) -> &Value {
    submission["log"]
        .as_array()
        .and_then(|log| log.last())
        .expect("log entry")
}

/// Asserts that `body` is an OperationOutcome with the given issue code.
pub fn assert_operation_outcome(body: &Value, code: &str) {
    assert_eq!(body["resourceType"], "OperationOutcome", "body: {body}");
    assert_eq!(body["issue"][0]["code"], code, "body: {body}");
}
