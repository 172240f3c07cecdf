//! Engine configuration.

use std::time::Duration;

use crate::protocol::EMPTY_MANIFEST_PATH;

/// Settings that drive protocol requests and status polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitConfig {
    /// Public base URL of this process, without trailing slash. Used to
    /// build the empty-manifest link sent on abort.
    pub public_base_url: String,

    /// Delay before the first status check after polling is armed.
    pub initial_poll_delay: Duration,

    /// Delay between status checks while the destination reports `202`.
    pub poll_interval: Duration,

    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            initial_poll_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SubmitConfig {
    /// Creates a configuration with short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            public_base_url: "http://provider.test".to_string(),
            initial_poll_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the public base URL.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    /// Sets both polling delays.
    pub fn with_poll_delays(mut self, initial: Duration, interval: Duration) -> Self {
        self.initial_poll_delay = initial;
        self.poll_interval = interval;
        self
    }

    /// Returns the URL of the empty manifest document.
    pub fn empty_manifest_url(&self) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            EMPTY_MANIFEST_PATH
        )
    }
}
