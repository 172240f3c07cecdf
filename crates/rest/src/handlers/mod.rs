//! HTTP request handlers for the Bulk Submit provider API.
//!
//! - [`submissions`] - Submission CRUD and submission-level protocol operations
//! - [`manifests`] - Manifest editing and manifest-level protocol operations
//! - [`hosting`] - Documents served to destination servers
//! - [`health`] - Health check endpoints

pub mod health;
pub mod hosting;
pub mod manifests;
pub mod submissions;

// Re-export handlers for convenience
pub use health::{health_handler, liveness_handler};
pub use hosting::empty_manifest_handler;
pub use manifests::{
    abort_manifest_handler, add_manifest_handler, remove_manifest_handler,
    replace_manifest_handler, submit_manifest_at_handler, update_manifest_handler,
};
pub use submissions::{
    abort_handler, complete_handler, create_handler, delete_handler, list_handler, read_handler,
    submit_manifest_handler, update_handler,
};

use std::future::Future;

use crate::error::{RestError, RestResult};

/// Runs a protocol exchange on its own task.
///
/// The exchange runs to completion even if the client disconnects and the
/// handler future is dropped.
pub(crate) async fn run_detached<F, T>(exchange: F) -> RestResult<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(exchange)
        .await
        .map_err(|err| RestError::InternalError {
            message: format!("Protocol exchange did not finish: {}", err),
        })
}

/// Fails with 400 unless `value` is an absolute http(s) URL.
pub(crate) fn require_http_url(field: &str, value: &str) -> RestResult<()> {
    if crate::config::is_http_url(value) {
        Ok(())
    } else {
        Err(RestError::bad_request(format!(
            "{} must be an absolute http(s) URL, got {:?}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_detached_returns_output() {
        assert_eq!(run_detached(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_detached_reports_panics() {
        let result: RestResult<()> = run_detached(async { panic!("boom") }).await;
        assert!(matches!(result, Err(RestError::InternalError { .. })));
    }

    #[test]
    fn test_require_http_url() {
        assert!(require_http_url("destinationBaseUrl", "https://dest.example/fhir").is_ok());
        let err = require_http_url("destinationBaseUrl", "dest.example").unwrap_err();
        assert!(err.to_string().contains("destinationBaseUrl"));
    }
}
