//! Manifests attached to a submission.
//!
//! A manifest is a reference to a set of exported data files hosted somewhere
//! the destination can reach. The registry keeps them in insertion order and
//! enforces unique URLs and status-based edit rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SubmitError, SubmitResult};

/// Lifecycle state of a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestStatus {
    /// Registered but never sent.
    #[default]
    NotStarted,
    /// A submit exchange is in flight.
    Submitting,
    /// Accepted by the destination.
    Submitted,
    /// Withdrawn with an abort exchange.
    Aborted,
    /// Status polling ended in a terminal failure.
    Failed,
    /// Superseded by another manifest.
    Replaced,
}

impl ManifestStatus {
    /// Returns true if a manifest in this state may be edited or removed.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Aborted | Self::Failed)
    }

    /// Returns true if a manifest in this state may be aborted.
    pub fn is_abortable(&self) -> bool {
        matches!(self, Self::Submitting | Self::Submitted)
    }

    /// Returns true while the destination is (or is about to be) working on
    /// the manifest.
    pub fn is_in_flight(&self) -> bool {
        self.is_abortable()
    }
}

impl std::fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::Submitting => write!(f, "submitting"),
            Self::Submitted => write!(f, "submitted"),
            Self::Aborted => write!(f, "aborted"),
            Self::Failed => write!(f, "failed"),
            Self::Replaced => write!(f, "replaced"),
        }
    }
}

impl std::str::FromStr for ManifestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(Self::NotStarted),
            "submitting" => Ok(Self::Submitting),
            "submitted" => Ok(Self::Submitted),
            "aborted" => Ok(Self::Aborted),
            "failed" => Ok(Self::Failed),
            "replaced" => Ok(Self::Replaced),
            _ => Err(format!("unknown manifest status: {}", s)),
        }
    }
}

/// A manifest registered on a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionManifest {
    /// URL of the manifest document.
    pub manifest_url: String,
    /// Base URL of the FHIR server the manifest was exported from.
    #[serde(rename = "FHIRBaseUrl")]
    pub fhir_base_url: String,
    /// Current lifecycle state.
    pub status: ManifestStatus,
    /// When the destination accepted the manifest.
    pub started_at: Option<DateTime<Utc>>,
    /// When the manifest was completed, aborted or replaced.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubmissionManifest {
    /// Creates a `not-started` manifest.
    pub fn new(manifest_url: impl Into<String>, fhir_base_url: impl Into<String>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            fhir_base_url: fhir_base_url.into(),
            status: ManifestStatus::NotStarted,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Input for adding or replacing a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewManifest {
    /// URL of the manifest document.
    #[serde(rename = "manifestUrl")]
    pub url: String,
    /// Base URL of the FHIR server the manifest was exported from.
    #[serde(rename = "FHIRBaseUrl")]
    pub fhir_base_url: String,
}

impl NewManifest {
    /// Creates a new manifest input.
    pub fn new(url: impl Into<String>, fhir_base_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fhir_base_url: fhir_base_url.into(),
        }
    }
}

/// Partial update of a manifest's URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestUpdate {
    /// New manifest URL.
    #[serde(default, rename = "manifestUrl")]
    pub url: Option<String>,
    /// New FHIR base URL.
    #[serde(default, rename = "FHIRBaseUrl")]
    pub fhir_base_url: Option<String>,
}

/// Ordered list of manifests with unique URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestRegistry {
    manifests: Vec<SubmissionManifest>,
}

impl ManifestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `not-started` manifest. Duplicate URLs are rejected
    /// without changing the registry.
    pub fn add(&mut self, manifest: NewManifest) -> SubmitResult<&SubmissionManifest> {
        self.insert(SubmissionManifest::new(manifest.url, manifest.fhir_base_url))
    }

    /// Registers a fully-formed manifest. Duplicate URLs are rejected.
    pub(crate) fn insert(
        &mut self,
        manifest: SubmissionManifest,
    ) -> SubmitResult<&SubmissionManifest> {
        if self.contains(&manifest.manifest_url) {
            return Err(SubmitError::DuplicateManifest {
                manifest_url: manifest.manifest_url,
            });
        }
        self.manifests.push(manifest);
        Ok(&self.manifests[self.manifests.len() - 1])
    }

    /// Returns the manifest at `index`.
    pub fn get(&self, index: usize) -> SubmitResult<&SubmissionManifest> {
        self.manifests
            .get(index)
            .ok_or(SubmitError::ManifestIndexOutOfRange {
                index,
                len: self.manifests.len(),
            })
    }

    /// Finds a manifest by URL.
    pub fn find(&self, manifest_url: &str) -> Option<&SubmissionManifest> {
        self.manifests
            .iter()
            .find(|m| m.manifest_url == manifest_url)
    }

    /// Finds a manifest by URL for mutation.
    pub(crate) fn find_mut(&mut self, manifest_url: &str) -> Option<&mut SubmissionManifest> {
        self.manifests
            .iter_mut()
            .find(|m| m.manifest_url == manifest_url)
    }

    /// Returns the index of the manifest with the given URL.
    pub fn position(&self, manifest_url: &str) -> Option<usize> {
        self.manifests
            .iter()
            .position(|m| m.manifest_url == manifest_url)
    }

    /// Returns true if a manifest with the given URL is registered.
    pub fn contains(&self, manifest_url: &str) -> bool {
        self.position(manifest_url).is_some()
    }

    /// Edits the URLs of the manifest at `index`.
    ///
    /// Only `not-started`, `aborted` and `failed` manifests are editable, and
    /// the new URL must not belong to another manifest.
    pub fn update_at(
        &mut self,
        index: usize,
        update: ManifestUpdate,
    ) -> SubmitResult<&SubmissionManifest> {
        let current = self.get(index)?;
        if !current.status.is_editable() {
            return Err(SubmitError::InvalidManifestState {
                manifest_url: current.manifest_url.clone(),
                operation: "update",
                status: current.status,
            });
        }
        if let Some(url) = &update.url {
            if self.position(url).is_some_and(|other| other != index) {
                return Err(SubmitError::DuplicateManifest {
                    manifest_url: url.clone(),
                });
            }
        }

        let manifest = &mut self.manifests[index];
        if let Some(url) = update.url {
            manifest.manifest_url = url;
        }
        if let Some(base) = update.fhir_base_url {
            manifest.fhir_base_url = base;
        }
        Ok(manifest)
    }

    /// Removes the manifest at `index`.
    ///
    /// Only `not-started`, `aborted` and `failed` manifests can be removed.
    pub fn remove_at(&mut self, index: usize) -> SubmitResult<SubmissionManifest> {
        let current = self.get(index)?;
        if !current.status.is_editable() {
            return Err(SubmitError::InvalidManifestState {
                manifest_url: current.manifest_url.clone(),
                operation: "remove",
                status: current.status,
            });
        }
        Ok(self.manifests.remove(index))
    }

    /// Removes the manifest with the given URL, subject to the same rules as
    /// [`remove_at`](Self::remove_at).
    pub fn remove(&mut self, manifest_url: &str) -> SubmitResult<SubmissionManifest> {
        let index = self
            .position(manifest_url)
            .ok_or_else(|| SubmitError::ManifestNotFound {
                manifest_url: manifest_url.to_string(),
            })?;
        self.remove_at(index)
    }

    /// Iterates manifests in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SubmissionManifest> {
        self.manifests.iter()
    }

    /// Iterates manifests for mutation.
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, SubmissionManifest> {
        self.manifests.iter_mut()
    }

    /// Returns the number of manifests.
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Returns true if no manifests are registered.
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl<'a> IntoIterator for &'a ManifestRegistry {
    type Item = &'a SubmissionManifest;
    type IntoIter = std::slice::Iter<'a, SubmissionManifest>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
