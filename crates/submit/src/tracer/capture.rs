//! Audit snapshots of outbound HTTP exchanges.

use std::collections::BTreeMap;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of an outbound request, kept for log display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Target URL as passed to the tracer.
    pub url: String,
    /// Request headers as a name → value map.
    pub headers: BTreeMap<String, String>,
    /// Body parsed as JSON when possible, raw text otherwise, `null` when absent.
    pub body: Value,
}

/// Snapshot of a received response, kept for log display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for `status`.
    pub status_text: String,
    /// Response headers with lower-case names.
    pub headers: BTreeMap<String, String>,
    /// Body parsed as JSON when possible, raw text otherwise.
    pub body: Value,
}

impl CapturedResponse {
    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Normalizes header pairs into a map. Later duplicates win.
pub fn normalize_headers<I, K, V>(headers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect()
}

/// Normalizes an [`HeaderMap`] into a map.
///
/// Repeated headers are joined with `", "`; values that are not visible
/// ASCII are decoded lossily.
pub fn header_map_to_object(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// Parses a body as JSON, falling back to the raw text.
pub fn parse_body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
