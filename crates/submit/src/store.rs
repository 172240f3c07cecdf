//! In-memory submission store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::submission::Submission;

/// Keyed registry of submissions.
///
/// Clones share the same map. The store holds no business logic; removing a
/// submission only stops its poll task.
#[derive(Debug, Clone, Default)]
pub struct SubmissionStore {
    submissions: Arc<RwLock<HashMap<String, Submission>>>,
}

impl SubmissionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a submission under its id.
    ///
    /// A displaced instance has its poll task stopped.
    pub fn save(&self, submission: Submission) {
        debug!(submission_id = %submission.id(), "Saving submission");
        let displaced = self
            .submissions
            .write()
            .insert(submission.id().to_string(), submission.clone());
        if let Some(old) = displaced.filter(|old| !old.ptr_eq(&submission)) {
            old.cancel_polling();
        }
    }

    /// Returns the submission with the given id.
    pub fn get(&self, id: &str) -> Option<Submission> {
        self.submissions.read().get(id).cloned()
    }

    /// Returns all submissions, oldest first.
    pub fn list(&self) -> Vec<Submission> {
        let mut submissions: Vec<Submission> =
            self.submissions.read().values().cloned().collect();
        submissions.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        submissions
    }

    /// Removes a submission and stops its poll task.
    pub fn remove(&self, id: &str) -> Option<Submission> {
        let removed = self.submissions.write().remove(id);
        if let Some(submission) = &removed {
            submission.cancel_polling();
            debug!(submission_id = %id, "Removed submission");
        }
        removed
    }

    /// Returns the number of stored submissions.
    pub fn len(&self) -> usize {
        self.submissions.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.submissions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::NewSubmission;

    #[test]
    fn test_save_get_remove() {
        let store = SubmissionStore::new();
        let submission = Submission::with_id("s1", NewSubmission::new("https://dest.example"));
        store.save(submission);

        assert_eq!(store.len(), 1);
        assert!(store.get("s1").is_some());
        assert!(store.get("missing").is_none());

        assert!(store.remove("s1").is_some());
        assert!(store.is_empty());
        assert!(store.remove("s1").is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = SubmissionStore::new();
        store.save(Submission::with_id("s1", NewSubmission::new("https://a.example")));
        store.save(Submission::with_id("s1", NewSubmission::new("https://b.example")));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("s1").unwrap().destination_base_url(),
            "https://b.example"
        );
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let store = SubmissionStore::new();
        for id in ["first", "second", "third"] {
            store.save(Submission::with_id(id, NewSubmission::new("https://dest.example")));
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let ids: Vec<String> = store.list().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_remove_cancels_polling() {
        let store = SubmissionStore::new();
        let submission = Submission::with_id("s1", NewSubmission::new("https://dest.example"));
        submission.install_poll_task(|| {
            tokio::spawn(async { tokio::time::sleep(std::time::Duration::from_secs(60)).await })
        });
        store.save(submission.clone());

        store.remove("s1");

        assert!(!submission.is_polling());
    }

    #[tokio::test]
    async fn test_save_over_existing_cancels_displaced_polling() {
        let store = SubmissionStore::new();
        let old = Submission::with_id("s1", NewSubmission::new("https://a.example"));
        old.install_poll_task(|| {
            tokio::spawn(async { tokio::time::sleep(std::time::Duration::from_secs(60)).await })
        });
        store.save(old.clone());

        // Saving the same instance again leaves its task alone.
        store.save(old.clone());
        assert!(old.is_polling());

        store.save(Submission::with_id("s1", NewSubmission::new("https://b.example")));
        assert!(!old.is_polling());
    }

    #[test]
    fn test_clones_share_map() {
        let store = SubmissionStore::new();
        let clone = store.clone();
        clone.save(Submission::new(NewSubmission::new("https://dest.example")));
        assert_eq!(store.len(), 1);
    }
}
