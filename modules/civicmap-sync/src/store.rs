use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use civicmap_common::{CivicMapError, Issue, IssueStatus, Suggestion};

/// Partial update against a stored issue. Mirrors the per-field updates
/// the remote collection accepts; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvotes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downvotes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_suggestion: Option<Suggestion>,
}

impl IssuePatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.upvotes.is_none()
            && self.downvotes.is_none()
            && self.add_suggestion.is_none()
    }

    pub fn apply_to(&self, issue: &mut Issue) {
        if let Some(status) = self.status {
            issue.status = status;
        }
        if let Some(upvotes) = self.upvotes {
            issue.upvotes = upvotes;
        }
        if let Some(downvotes) = self.downvotes {
            issue.downvotes = downvotes;
        }
        if let Some(suggestion) = &self.add_suggestion {
            // Appends are replayed during reconciliation; dedupe by id.
            if !issue.suggestions.iter().any(|s| s.id == suggestion.id) {
                issue.suggestions.push(suggestion.clone());
            }
        }
    }
}

/// The remote document collection, as seen by this crate. The concrete
/// backend is a collaborator; everything here is id-keyed CRUD with
/// last-write-wins semantics and no conflict detection.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn create(&self, issue: &Issue) -> Result<String, CivicMapError>;
    async fn list(&self) -> Result<Vec<Issue>, CivicMapError>;
    /// Apply a partial update and return the confirmed post-update issue.
    async fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicMapError>;
    async fn delete(&self, id: &str) -> Result<(), CivicMapError>;
}

// --- In-memory store ---

/// In-memory store for tests and demo mode. The `offline` switch makes
/// every call fail the way an unreachable backend would.
pub struct MemoryIssueStore {
    issues: Mutex<Vec<Issue>>,
    offline: AtomicBool,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), CivicMapError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CivicMapError::Store("store unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryIssueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn create(&self, issue: &Issue) -> Result<String, CivicMapError> {
        self.check_reachable()?;
        let mut issues = self.issues.lock().await;
        if issues.iter().any(|i| i.id == issue.id) {
            return Err(CivicMapError::Store(format!(
                "duplicate issue id {}",
                issue.id
            )));
        }
        issues.push(issue.clone());
        Ok(issue.id.clone())
    }

    async fn list(&self) -> Result<Vec<Issue>, CivicMapError> {
        self.check_reachable()?;
        Ok(self.issues.lock().await.clone())
    }

    async fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicMapError> {
        self.check_reachable()?;
        let mut issues = self.issues.lock().await;
        let issue = issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CivicMapError::NotFound(format!("issue {id}")))?;
        patch.apply_to(issue);
        Ok(issue.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), CivicMapError> {
        self.check_reachable()?;
        let mut issues = self.issues.lock().await;
        let before = issues.len();
        issues.retain(|i| i.id != id);
        if issues.len() == before {
            return Err(CivicMapError::NotFound(format!("issue {id}")));
        }
        Ok(())
    }
}

// --- HTTP store ---

/// reqwest client against a document-collection REST backend. Reads are
/// duck-typed: documents that fail to decode are skipped with a warning
/// instead of failing the whole list.
pub struct HttpIssueStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIssueStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl IssueStore for HttpIssueStore {
    async fn create(&self, issue: &Issue) -> Result<String, CivicMapError> {
        let resp = self
            .client
            .post(self.url("/issues"))
            .json(issue)
            .send()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?
            .error_for_status()
            .map_err(|e| CivicMapError::Store(e.to_string()))?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?;
        Ok(body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or(&issue.id)
            .to_string())
    }

    async fn list(&self) -> Result<Vec<Issue>, CivicMapError> {
        let resp = self
            .client
            .get(self.url("/issues"))
            .send()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?
            .error_for_status()
            .map_err(|e| CivicMapError::Store(e.to_string()))?;
        let docs: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?;

        let mut issues = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<Issue>(doc) {
                Ok(issue) => issues.push(issue),
                Err(e) => warn!(error = %e, "Skipping undecodable issue document"),
            }
        }
        Ok(issues)
    }

    async fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicMapError> {
        let resp = self
            .client
            .patch(self.url(&format!("/issues/{id}")))
            .json(patch)
            .send()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?
            .error_for_status()
            .map_err(|e| CivicMapError::Store(e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), CivicMapError> {
        self.client
            .delete(self.url(&format!("/issues/{id}")))
            .send()
            .await
            .map_err(|e| CivicMapError::Store(e.to_string()))?
            .error_for_status()
            .map_err(|e| CivicMapError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civicmap_common::{demo_issues, IssueStatus};

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryIssueStore::new();
        let issue = demo_issues().remove(0);
        store.create(&issue).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        let patch = IssuePatch {
            status: Some(IssueStatus::Resolved),
            ..Default::default()
        };
        let updated = store.update(&issue.id, &patch).await.unwrap();
        assert_eq!(updated.status, IssueStatus::Resolved);

        store.delete(&issue.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryIssueStore::new();
        store.set_offline(true);
        let err = store.list().await.unwrap_err();
        assert!(matches!(err, CivicMapError::Store(_)));
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let store = MemoryIssueStore::new();
        let issue = demo_issues().remove(0);
        store.create(&issue).await.unwrap();
        assert!(store.create(&issue).await.is_err());
    }
}
