//! Activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracer::{CapturedRequest, CapturedResponse};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational message.
    #[default]
    Info,
    /// Something unusual that did not fail the operation.
    Warn,
    /// A failed exchange or operation.
    Error,
}

impl LogLevel {
    /// Returns the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a submission's activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// When the entry (or its latest repeat) was recorded.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub level: LogLevel,
    /// Additional detail, typically an error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The outbound request this entry documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<CapturedRequest>,
    /// The response received for `request`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CapturedResponse>,
    /// How many consecutive times this entry was recorded.
    pub count: u32,
}

impl LogEntry {
    /// Creates an entry stamped with the current time and a count of 1.
    pub fn new(message: impl Into<String>, options: RecordOptions) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level: options.level,
            details: options.details,
            request: options.request,
            response: options.response,
            count: 1,
        }
    }

    /// Decides whether `self` repeats `previous` closely enough to be merged
    /// into it.
    ///
    /// Compared fields: message, level, details, request method, URL and body,
    /// response status and body. Timestamps, headers, status text and the
    /// counter are ignored.
    pub fn is_repeat_of(&self, previous: &LogEntry) -> bool {
        if self.message != previous.message
            || self.level != previous.level
            || self.details != previous.details
        {
            return false;
        }

        let request_key = |entry: &LogEntry| {
            entry
                .request
                .as_ref()
                .map(|r| (r.method.clone(), r.url.clone(), r.body.clone()))
        };
        if request_key(self) != request_key(previous) {
            return false;
        }

        let response_key = |entry: &LogEntry| {
            entry
                .response
                .as_ref()
                .map(|r| (r.status, r.body.clone()))
        };
        response_key(self) == response_key(previous)
    }
}

/// Optional attributes of a log record.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub(crate) level: LogLevel,
    pub(crate) details: Option<String>,
    pub(crate) request: Option<CapturedRequest>,
    pub(crate) response: Option<CapturedResponse>,
}

impl RecordOptions {
    /// Creates options for an `info` record without attachments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `RecordOptions::new().level(LogLevel::Warn)`.
    pub fn warn() -> Self {
        Self::new().level(LogLevel::Warn)
    }

    /// Shorthand for `RecordOptions::new().level(LogLevel::Error)`.
    pub fn error() -> Self {
        Self::new().level(LogLevel::Error)
    }

    /// Sets the severity.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the details text.
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches a captured request.
    pub fn request(mut self, request: Option<CapturedRequest>) -> Self {
        self.request = request;
        self
    }

    /// Attaches a captured response.
    pub fn response(mut self, response: Option<CapturedResponse>) -> Self {
        self.response = response;
        self
    }

    /// Returns the configured severity.
    pub fn severity(&self) -> LogLevel {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn response(status: u16, body: serde_json::Value) -> CapturedResponse {
        CapturedResponse {
            status,
            status_text: "OK".to_string(),
            headers: BTreeMap::new(),
            body,
        }
    }

    #[test]
    fn test_default_level_is_info() {
        let entry = LogEntry::new("hello", RecordOptions::new());
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.count, 1);
        assert!(entry.details.is_none());
    }

    #[test]
    fn test_repeat_ignores_timestamp_and_headers() {
        let first = LogEntry::new(
            "Status: 10%",
            RecordOptions::new().response(Some(response(202, json!("")))),
        );
        let mut second = first.clone();
        second.timestamp = first.timestamp + chrono::Duration::seconds(5);
        second
            .response
            .as_mut()
            .unwrap()
            .headers
            .insert("x-progress".to_string(), "10%".to_string());

        assert!(second.is_repeat_of(&first));
    }

    #[test]
    fn test_repeat_compares_response_body_by_value() {
        let first = LogEntry::new(
            "poll",
            RecordOptions::new().response(Some(response(200, json!({"output": []})))),
        );
        let same = LogEntry::new(
            "poll",
            RecordOptions::new().response(Some(response(200, json!({"output": []})))),
        );
        let different = LogEntry::new(
            "poll",
            RecordOptions::new().response(Some(response(200, json!({"output": [1]})))),
        );

        assert!(same.is_repeat_of(&first));
        assert!(!different.is_repeat_of(&first));
    }

    #[test]
    fn test_not_repeat_when_level_or_details_differ() {
        let first = LogEntry::new("x", RecordOptions::new());
        assert!(!LogEntry::new("x", RecordOptions::warn()).is_repeat_of(&first));
        assert!(!LogEntry::new("x", RecordOptions::new().details("d")).is_repeat_of(&first));
        assert!(!LogEntry::new("y", RecordOptions::new()).is_repeat_of(&first));
    }

    #[test]
    fn test_serializes_camel_case_without_empty_fields() {
        let entry = LogEntry::new("hello", RecordOptions::error().details("boom"));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["details"], "boom");
        assert_eq!(value["count"], 1);
        assert!(value.get("request").is_none());
        assert!(value.get("response").is_none());
    }
}
