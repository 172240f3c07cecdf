//! HTTP transport abstraction.
//!
//! The tracer never talks to the network directly; it goes through an
//! [`HttpTransport`]. Production code uses [`ReqwestTransport`], tests plug in
//! scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// Boxed error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A request to be sent through a transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl OutboundRequest {
    /// Creates a `GET` request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a `GET` request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url)
    }

    /// Creates a `POST` request for `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).method(Method::POST)
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a single header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds headers from name/value pairs.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds every header of an [`HeaderMap`].
    pub fn header_map(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.push((
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ));
        }
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body. Headers are left untouched.
    pub fn json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// Returns the HTTP method.
    pub fn method_ref(&self) -> &Method {
        &self.method
    }

    /// Returns the target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the header pairs in insertion order.
    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the raw body, if any.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body as text.
    pub body: String,
    /// Set when the status and headers arrived but reading the body failed.
    pub body_error: Option<String>,
}

impl TransportResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            body_error: None,
        }
    }

    /// Marks the body as unreadable.
    pub fn with_body_error(mut self, error: impl Into<String>) -> Self {
        self.body_error = Some(error.into());
        self
    }
}

/// Performs a single HTTP exchange.
///
/// Any response the server produced, including 4xx and 5xx, is `Ok`. `Err`
/// is reserved for failures where no response was obtained.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Returns a short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Sends `request` and returns the raw response.
    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, BoxError>;
}

/// [`HttpTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, BoxError> {
        let mut builder = self
            .client
            .request(request.method_ref().clone(), request.url());

        for (name, value) in request.header_pairs() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body_text() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let (body, body_error) = match response.text().await {
            Ok(body) => (body, None),
            Err(err) => (String::new(), Some(super::describe_error(&err))),
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
            body_error,
        })
    }
}
