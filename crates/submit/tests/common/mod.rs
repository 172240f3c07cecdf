//! Common test utilities for the submission engine.
//!
//! Provides a scripted [`HttpTransport`] so orchestrator tests can run
//! without a network, plus helpers for building submissions and waiting on
//! background polling.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use helios_submit::{
    BoxError, HttpTransport, NewManifest, NewSubmission, OutboundRequest, RequestTracer,
    Submission, SubmissionOrchestrator, SubmitConfig, TransportResponse,
};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;

/// Destination base URL used throughout the tests.
pub const DEST: &str = "https://dest.example/fhir";

/// Absolute status location handed out by scripted kickoffs.
pub const STATUS_LOCATION: &str = "https://dest.example/status/1";

/// Source server the test manifests were exported from.
pub const SOURCE_FHIR: &str = "https://src.example/fhir";

/// A canned answer for a scripted route.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Reply with a response.
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    /// Fail without a response.
    Failure(String),
}

impl Scripted {
    /// A response with an empty body.
    pub fn status(status: u16) -> Self {
        Self::Response {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// A transport failure.
    pub fn failure(message: &str) -> Self {
        Self::Failure(message.to_string())
    }

    /// A `202` kickoff answer pointing at `location`.
    pub fn kickoff(location: &str) -> Self {
        Self::status(202).header("content-location", location)
    }

    /// A `202` status answer carrying `progress`.
    pub fn progress(progress: &str) -> Self {
        Self::status(202).header("x-progress", progress)
    }

    /// Adds a response header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Self::Response { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Sets a JSON response body.
    pub fn json(mut self, value: Value) -> Self {
        if let Self::Response { body, headers, .. } = &mut self {
            *body = value.to_string();
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        self
    }
}

/// A request observed by the scripted transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedCall {
    /// Returns the `Parameters` entry with the given name.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.body
            .as_ref()?
            .get("parameter")?
            .as_array()?
            .iter()
            .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
    }

    /// Returns a `valueString` parameter.
    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name)?.get("valueString")?.as_str()
    }

    /// Returns the `submissionStatus` code.
    pub fn status_code(&self) -> Option<&str> {
        self.parameter("submissionStatus")?
            .get("valueCoding")?
            .get("code")?
            .as_str()
    }

    /// Looks up a request header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Route {
    method: Method,
    suffix: String,
    queue: VecDeque<Scripted>,
}

/// [`HttpTransport`] that answers from scripted queues.
///
/// Routes match on method and URL suffix. Each route pops its queue until a
/// single answer remains, which then repeats. Unmatched requests get a `404`.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Mutex<Option<Duration>>,
    next_delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delays every answer.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Delays only the next answer.
    pub fn delay_next(&self, delay: Duration) {
        *self.next_delay.lock() = Some(delay);
    }

    /// Queues an answer for requests matching `method` and `suffix`.
    pub fn on(&self, method: Method, suffix: &str, answer: Scripted) -> &Self {
        let mut routes = self.routes.lock();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.suffix == suffix)
        {
            Some(route) => route.queue.push_back(answer),
            None => routes.push(Route {
                method,
                suffix: suffix.to_string(),
                queue: VecDeque::from([answer]),
            }),
        }
        self
    }

    /// Scripts the usual happy path: accepted submit and a kickoff pointing
    /// at [`STATUS_LOCATION`].
    pub fn accept_submissions(&self) -> &Self {
        self.on(Method::POST, "/$bulk-submit", Scripted::status(200))
            .on(
                Method::POST,
                "/$bulk-submit-status",
                Scripted::kickoff(STATUS_LOCATION),
            )
    }

    /// Returns every request seen so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the requests whose URL ends with `suffix`.
    pub fn calls_to(&self, suffix: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.url.ends_with(suffix))
            .cloned()
            .collect()
    }

    fn answer(&self, method: &Method, url: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .find(|r| &r.method == method && url.ends_with(&r.suffix))?;
        if route.queue.len() > 1 {
            route.queue.pop_front()
        } else {
            route.queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, BoxError> {
        self.calls.lock().push(RecordedCall {
            method: request.method_ref().clone(),
            url: request.url().to_string(),
            headers: request.header_pairs().to_vec(),
            body: request
                .body_text()
                .and_then(|body| serde_json::from_str(body).ok()),
        });

        let next = self.next_delay.lock().take();
        let delay = next.or(*self.delay.lock());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.answer(request.method_ref(), request.url()) {
            Some(Scripted::Response {
                status,
                headers,
                body,
            }) => {
                let mut response =
                    TransportResponse::new(StatusCode::from_u16(status)?, body);
                for (name, value) in headers {
                    response.headers.append(
                        HeaderName::from_bytes(name.as_bytes())?,
                        HeaderValue::from_str(&value)?,
                    );
                }
                Ok(response)
            }
            Some(Scripted::Failure(message)) => Err(Box::new(std::io::Error::other(message))),
            None => Ok(TransportResponse::new(StatusCode::NOT_FOUND, "")),
        }
    }
}

/// Configuration whose first poll happens almost immediately.
pub fn fast_config() -> SubmitConfig {
    SubmitConfig::for_testing()
}

/// Configuration whose poll task never reaches its first check during a test.
pub fn idle_config() -> SubmitConfig {
    SubmitConfig::for_testing()
        .with_poll_delays(Duration::from_secs(3600), Duration::from_secs(3600))
}

/// Creates an orchestrator over `transport`.
pub fn orchestrator(transport: &Arc<ScriptedTransport>, config: SubmitConfig) -> SubmissionOrchestrator {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    SubmissionOrchestrator::new(RequestTracer::new(transport), config)
}

/// Manifest URL for test manifest `n`.
pub fn manifest_url(n: usize) -> String {
    format!("https://src.example/exports/{n}/manifest.json")
}

/// Creates a submission to [`DEST`] with `count` not-started manifests.
pub fn submission_with_manifests(count: usize) -> Submission {
    let submission = Submission::new(NewSubmission::new(DEST).with_name("Test submission"));
    for n in 1..=count {
        submission
            .add_manifest(NewManifest::new(manifest_url(n), SOURCE_FHIR))
            .expect("Failed to add manifest");
    }
    submission
}

/// Waits until `condition` holds, panicking after two seconds.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
