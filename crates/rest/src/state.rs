//! Application state for the Bulk Submit provider API.
//!
//! This module defines the shared application state that is available to all
//! request handlers: the submission store, the orchestrator that talks to
//! destination servers, and the server configuration.

use std::sync::Arc;

use helios_submit::{Submission, SubmissionOrchestrator, SubmissionStore};

use crate::config::ServerConfig;
use crate::error::{RestError, RestResult};

/// Shared application state for the REST API.
///
/// # Example
///
/// ```rust,ignore
/// use helios_submit::{SubmissionOrchestrator, SubmissionStore};
/// use helios_submit_rest::{AppState, ServerConfig};
///
/// let config = ServerConfig::default();
/// let orchestrator = SubmissionOrchestrator::from_config(config.submit_config())?;
/// let state = AppState::new(SubmissionStore::new(), orchestrator, config);
/// ```
pub struct AppState {
    /// Submissions known to this process.
    store: SubmissionStore,

    /// Protocol engine.
    orchestrator: SubmissionOrchestrator,

    /// Server configuration.
    config: Arc<ServerConfig>,
}

// The store and orchestrator are cheap handles over shared state.
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            orchestrator: self.orchestrator.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl AppState {
    /// Creates a new AppState.
    ///
    /// # Arguments
    ///
    /// * `store` - The submission store
    /// * `orchestrator` - The protocol orchestrator
    /// * `config` - Server configuration
    pub fn new(
        store: SubmissionStore,
        orchestrator: SubmissionOrchestrator,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config: Arc::new(config),
        }
    }

    /// Creates state with an empty store and an orchestrator built from
    /// `config`.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let orchestrator = SubmissionOrchestrator::from_config(config.submit_config())?;
        Ok(Self::new(SubmissionStore::new(), orchestrator, config))
    }

    /// Returns the submission store.
    pub fn store(&self) -> &SubmissionStore {
        &self.store
    }

    /// Returns the orchestrator.
    pub fn orchestrator(&self) -> &SubmissionOrchestrator {
        &self.orchestrator
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the public base URL of this server.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Looks up a submission, failing with 404 when it is unknown.
    pub fn submission(&self, id: &str) -> RestResult<Submission> {
        self.store
            .get(id)
            .ok_or_else(|| RestError::submission_not_found(id))
    }
}
