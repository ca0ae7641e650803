use tracing::{info, warn};

use civicmap_common::{demo_issues, Issue};

use crate::store::{IssuePatch, IssueStore};

/// In-memory ordered view of all issues: the fixed demo set first, then
/// whatever the remote store returned, in fetch order. Rebuilt wholesale
/// on every load rather than patched incrementally.
pub struct IssueCache {
    issues: Vec<Issue>,
}

impl IssueCache {
    /// Start with the demo set only, before the first remote fetch.
    pub fn new() -> Self {
        Self {
            issues: demo_issues(),
        }
    }

    /// Merge the demo set with a fresh remote fetch, demo records first.
    /// Demo records are kept as currently held (they may carry local
    /// votes or suggestions that never go remote). A failed fetch keeps
    /// whatever was already displayed instead of clearing it.
    ///
    /// Returns true if the view was rebuilt from the store.
    pub async fn load(&mut self, store: &dyn IssueStore) -> bool {
        match store.list().await {
            Ok(remote) => {
                let mut merged: Vec<Issue> =
                    self.issues.iter().filter(|i| i.is_demo()).cloned().collect();
                if merged.is_empty() {
                    merged = demo_issues();
                }
                merged.extend(remote);
                info!(count = merged.len(), "Issue cache reloaded");
                self.issues = merged;
                true
            }
            Err(e) => {
                warn!(error = %e, "Issue fetch failed; keeping cached view");
                false
            }
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Append a locally-created issue for immediate display.
    pub fn insert(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Replace an issue with its remotely-confirmed version, or apply the
    /// patch locally when there is no remote version (demo and offline
    /// records).
    pub fn reconcile(&mut self, confirmed: Issue) {
        if let Some(slot) = self.issues.iter_mut().find(|i| i.id == confirmed.id) {
            *slot = confirmed;
        }
    }

    pub fn apply_patch(&mut self, id: &str, patch: &IssuePatch) -> bool {
        match self.issues.iter_mut().find(|i| i.id == id) {
            Some(issue) => {
                patch.apply_to(issue);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.issues.len();
        self.issues.retain(|i| i.id != id);
        self.issues.len() != before
    }
}

impl Default for IssueCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIssueStore;
    use civicmap_common::{GeoPoint, IssueCategory, IssueStatus, Reporter};
    use chrono::Utc;

    fn user_issue(id: &str) -> Issue {
        Issue {
            id: id.to_string(),
            reporter: Reporter {
                user_id: "u1".to_string(),
                display_name: "Test User".to_string(),
            },
            title: "Test".to_string(),
            category: IssueCategory::Garbage,
            description: "desc".to_string(),
            location: GeoPoint { lat: 28.6, lng: 77.2 },
            address: None,
            photos: Vec::new(),
            status: IssueStatus::Reported,
            created_at: Utc::now(),
            upvotes: 0,
            downvotes: 0,
            suggestions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn load_puts_demo_records_first() {
        let store = MemoryIssueStore::new();
        store.create(&user_issue("issue-a")).await.unwrap();

        let mut cache = IssueCache::new();
        cache.load(&store).await;

        assert_eq!(cache.len(), 4);
        assert!(cache.issues()[0].is_demo());
        assert!(cache.issues()[1].is_demo());
        assert!(cache.issues()[2].is_demo());
        assert_eq!(cache.issues()[3].id, "issue-a");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_view() {
        let store = MemoryIssueStore::new();
        store.create(&user_issue("issue-a")).await.unwrap();

        let mut cache = IssueCache::new();
        cache.load(&store).await;
        assert_eq!(cache.len(), 4);

        store.set_offline(true);
        cache.load(&store).await;
        assert_eq!(cache.len(), 4, "fetch failure must not clear the cache");
    }
}
