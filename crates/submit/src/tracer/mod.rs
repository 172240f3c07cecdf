//! Outbound request tracing.
//!
//! [`RequestTracer::send`] performs one HTTP exchange and turns it into a
//! [`TraceResult`]: a snapshot of what was sent, what came back, and a
//! classified error string. The tracer never returns `Err`; failures are
//! data that end up in a submission's activity log.

mod capture;
mod transport;

pub use capture::{
    CapturedRequest, CapturedResponse, header_map_to_object, normalize_headers, parse_body,
};
pub use transport::{
    BoxError, HttpTransport, OutboundRequest, ReqwestTransport, TransportResponse,
};

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

/// Maximum number of `source()` links included in an error description.
const MAX_ERROR_DEPTH: usize = 5;

/// Outcome of a traced exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    /// What was sent.
    pub request: CapturedRequest,
    /// What came back, if anything did.
    pub response: Option<CapturedResponse>,
    /// `None` for a 2xx response, a description otherwise.
    pub error: Option<String>,
}

impl TraceResult {
    /// Returns true if a 2xx response was received.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the response status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Looks up a response header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.header(name))
    }
}

/// Sends requests through an [`HttpTransport`] and captures the exchange.
#[derive(Clone)]
pub struct RequestTracer {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for RequestTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracer")
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl RequestTracer {
    /// Creates a tracer over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Creates a tracer backed by [`ReqwestTransport`].
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(timeout)?)))
    }

    /// Performs `request` and captures the exchange.
    pub async fn send(&self, request: OutboundRequest) -> TraceResult {
        let captured = CapturedRequest {
            method: request.method_ref().as_str().to_string(),
            url: request.url().to_string(),
            headers: normalize_headers(
                request
                    .header_pairs()
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            ),
            body: request.body_text().map(parse_body).unwrap_or(Value::Null),
        };

        debug!(
            method = %captured.method,
            url = %captured.url,
            transport = self.transport.name(),
            "Sending outbound request"
        );

        match self.transport.execute(&request).await {
            Ok(raw) => {
                let status_text = raw.status.canonical_reason().unwrap_or_default().to_string();
                let error = if let Some(body_error) = &raw.body_error {
                    warn!(url = %captured.url, error = %body_error, "Failed to read response body");
                    Some(body_error.clone())
                } else if raw.status.is_success() {
                    None
                } else {
                    Some(
                        format!("{} {}", raw.status.as_u16(), status_text)
                            .trim_end()
                            .to_string(),
                    )
                };

                debug!(url = %captured.url, status = raw.status.as_u16(), "Received response");

                TraceResult {
                    request: captured,
                    response: Some(CapturedResponse {
                        status: raw.status.as_u16(),
                        status_text,
                        headers: header_map_to_object(&raw.headers),
                        body: parse_body(&raw.body),
                    }),
                    error,
                }
            }
            Err(err) => {
                let description = describe_error(err.as_ref());
                warn!(url = %captured.url, error = %description, "Outbound request failed");

                TraceResult {
                    request: captured,
                    response: None,
                    error: Some(description),
                }
            }
        }
    }
}

/// Describes an error together with its `source()` chain.
///
/// Produces `"outer (caused by: inner (caused by: root))"`, following at most
/// five links.
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut chain = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if chain.len() == MAX_ERROR_DEPTH {
            break;
        }
        chain.push(e.to_string());
        current = e.source();
    }

    let mut description = String::new();
    for (depth, message) in chain.iter().enumerate() {
        if depth > 0 {
            description.push_str(" (caused by: ");
        }
        description.push_str(message);
    }
    for _ in 1..chain.len() {
        description.push(')');
    }

    if description.is_empty() {
        "unknown error".to_string()
    } else {
        description
    }
}
