//! # helios-submit - Bulk Data Submit provider engine
//!
//! This crate implements the *sender* side of the Bulk Data Submit protocol.
//! Given a destination server, it packages data manifests into `$bulk-submit`
//! requests, transmits them, and tracks asynchronous completion by polling
//! the destination's status endpoint until it reports success or failure.
//!
//! ## Components
//!
//! - [`log`] - Per-submission activity log with adjacent-duplicate collapsing
//! - [`tracer`] - Outbound HTTP tracing behind the [`HttpTransport`] seam
//! - [`manifest`] - Manifest registry and manifest lifecycle states
//! - [`submission`] - Submission handle and derived submission status
//! - [`orchestrator`] - Protocol operations and the status polling loop
//! - [`store`] - In-memory keyed store of submissions
//! - [`protocol`] - Operation names, headers and `Parameters` bodies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use helios_submit::{
//!     NewManifest, NewSubmission, Submission, SubmissionOrchestrator, SubmitConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = SubmissionOrchestrator::from_config(SubmitConfig::default())?;
//!
//! let submission = Submission::new(NewSubmission::new("https://dest.example/fhir"));
//! submission.add_manifest(NewManifest::new(
//!     "https://src.example/exports/1/manifest.json",
//!     "https://src.example/fhir",
//! ))?;
//!
//! // Sends `$bulk-submit` and, once accepted, starts polling in the background.
//! orchestrator
//!     .submit_manifest(&submission, "https://src.example/exports/1/manifest.json")
//!     .await?;
//!
//! println!("{}", submission.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Only validation failures (unknown manifest, duplicate URL, wrong state)
//! are returned as [`SubmitError`]. Failures reported by the destination or
//! the network are recorded in the submission's activity log and leave its
//! state unchanged.

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod log;
pub mod manifest;
pub mod orchestrator;
pub mod protocol;
pub mod store;
pub mod submission;
pub mod tracer;

// Re-export commonly used types
pub use config::SubmitConfig;
pub use error::{SubmitError, SubmitResult};
pub use log::{ActivityLog, LogEntry, LogLevel, RecordOptions};
pub use manifest::{
    ManifestRegistry, ManifestStatus, ManifestUpdate, NewManifest, SubmissionManifest,
};
pub use orchestrator::{StatusCheck, SubmissionOrchestrator};
pub use store::SubmissionStore;
pub use submission::{
    NewSubmission, Submission, SubmissionStatus, SubmissionUpdate, SubmissionView, Submitter,
    derive_status,
};
pub use tracer::{
    BoxError, CapturedRequest, CapturedResponse, HttpTransport, OutboundRequest,
    ReqwestTransport, RequestTracer, TraceResult, TransportResponse,
};
