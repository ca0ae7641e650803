use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use civicmap_common::{
    CivicMapError, GeoPoint, Issue, IssueCategory, IssueStatus, Reporter, Suggestion,
};

use crate::cache::IssueCache;
use crate::filter::IssueFilter;
use crate::queue::{OfflineQueue, PendingMutation};
use crate::store::{IssuePatch, IssueStore};
use crate::votes::{VoteChoice, VoteLedger};

/// A submission before it has an id, status, or counters.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub reporter: Reporter,
    pub title: String,
    pub category: IssueCategory,
    pub description: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub photos: Vec<String>,
}

/// Ties the cache, offline queue, and remote store together.
///
/// While online, mutations go to the remote store first and the cache is
/// reconciled from the confirmed response; a remote failure on a patch is
/// returned to the caller instead of leaving the cache silently diverged,
/// while a failed create degrades to the offline queue. While
/// offline, mutations queue durably and apply to the cache optimistically
/// until `set_online(true)` drains them. Mutations on demo-seeded issues
/// never reach the store at all.
pub struct IssueService {
    store: Arc<dyn IssueStore>,
    cache: IssueCache,
    queue: OfflineQueue,
    online: bool,
}

impl IssueService {
    pub fn new(store: Arc<dyn IssueStore>, data_dir: &Path) -> Result<Self, CivicMapError> {
        Ok(Self {
            store,
            cache: IssueCache::new(),
            queue: OfflineQueue::open(data_dir)?,
            online: true,
        })
    }

    // --- Views ---

    pub fn issues(&self) -> &[Issue] {
        self.cache.issues()
    }

    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.cache.get(id)
    }

    pub fn filtered(&self, filter: &IssueFilter) -> Vec<Issue> {
        filter.apply(self.cache.issues())
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    // --- Connectivity ---

    /// Flip connectivity. The offline→online transition drains the queue
    /// (exactly once per transition) and then reloads the cache.
    pub async fn set_online(&mut self, online: bool) {
        let was_online = self.online;
        self.online = online;
        if online && !was_online {
            match self.queue.drain(self.store.as_ref()).await {
                Ok(report) => info!(
                    synced = report.synced,
                    failed = report.failed,
                    dropped = report.dropped,
                    "Offline queue drained"
                ),
                Err(e) => warn!(error = %e, "Offline queue drain failed"),
            }
            self.refresh().await;
        }
    }

    /// Reload the cache from the store, then replay still-pending offline
    /// mutations on top so unsynced local work stays visible. The replay
    /// only runs over a freshly rebuilt view; a kept view already has the
    /// pending mutations applied.
    pub async fn refresh(&mut self) {
        if !self.online || !self.cache.load(self.store.as_ref()).await {
            return;
        }
        for entry in self.queue.entries() {
            match &entry.mutation {
                PendingMutation::Create { issue } => {
                    if self.cache.get(&issue.id).is_none() {
                        self.cache.insert(issue.clone());
                    }
                }
                PendingMutation::Update { id, patch } => {
                    self.cache.apply_patch(id, patch);
                }
                PendingMutation::Delete { id } => {
                    self.cache.remove(id);
                }
            }
        }
    }

    // --- Mutations ---

    /// Validate and submit a new issue. Online, the store confirms it
    /// before it lands in the cache; offline, it queues durably and shows
    /// up immediately with status `reported` and zero votes. An
    /// unreachable store at submit time demotes the service to offline
    /// and queues the submission rather than failing it.
    pub async fn submit(&mut self, new_issue: NewIssue) -> Result<Issue, CivicMapError> {
        if new_issue.title.trim().is_empty() {
            return Err(CivicMapError::Validation("title is required".to_string()));
        }
        if new_issue.description.trim().is_empty() {
            return Err(CivicMapError::Validation(
                "description is required".to_string(),
            ));
        }
        if !new_issue.location.is_valid() {
            return Err(CivicMapError::Validation(
                "location coordinates are out of range".to_string(),
            ));
        }

        let issue = Issue {
            id: Issue::new_id(),
            reporter: new_issue.reporter,
            title: new_issue.title.trim().to_string(),
            category: new_issue.category,
            description: new_issue.description.trim().to_string(),
            location: new_issue.location,
            address: new_issue.address,
            photos: new_issue.photos,
            status: IssueStatus::Reported,
            created_at: Utc::now(),
            upvotes: 0,
            downvotes: 0,
            suggestions: Vec::new(),
        };

        if self.online {
            match self.store.create(&issue).await {
                Ok(_) => info!(issue = %issue.id, "Issue created remotely"),
                Err(e) if e.is_degradable() => {
                    // Unreachable store demotes the service to offline; the
                    // submission queues instead of bouncing back to the caller.
                    warn!(error = %e, issue = %issue.id, "Store unreachable; queuing issue");
                    self.online = false;
                    self.queue
                        .enqueue(PendingMutation::Create { issue: issue.clone() })?;
                }
                Err(e) => return Err(e),
            }
        } else {
            self.queue
                .enqueue(PendingMutation::Create { issue: issue.clone() })?;
            info!(issue = %issue.id, "Offline; issue queued for sync");
        }
        self.cache.insert(issue.clone());
        Ok(issue)
    }

    /// Record a vote through the caller's ledger and apply the counter
    /// delta to the issue as one unit. Anonymous ledgers reject the vote
    /// before anything changes.
    pub async fn set_vote(
        &mut self,
        ledger: &mut VoteLedger,
        issue_id: &str,
        vote: Option<VoteChoice>,
    ) -> Result<Issue, CivicMapError> {
        let current = self
            .cache
            .get(issue_id)
            .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")))?
            .clone();

        let previous = ledger.get(issue_id);
        let delta = ledger.set_vote(issue_id, vote)?;
        if delta.is_noop() {
            return Ok(current);
        }

        let mut updated = current.clone();
        delta.apply_to(&mut updated);
        let patch = IssuePatch {
            upvotes: Some(updated.upvotes),
            downvotes: Some(updated.downvotes),
            ..Default::default()
        };

        match self.apply_mutation(&current, issue_id, patch).await {
            Ok(issue) => Ok(issue),
            Err(e) => {
                // Revert the ledger so the vote and the counters agree.
                let _ = ledger.set_vote(issue_id, previous);
                Err(e)
            }
        }
    }

    /// Append a suggestion. Requires an authenticated author.
    pub async fn add_suggestion(
        &mut self,
        author: &Reporter,
        issue_id: &str,
        text: &str,
    ) -> Result<Issue, CivicMapError> {
        if author.user_id.is_empty() || author.user_id == "anonymous" {
            return Err(CivicMapError::AuthRequired);
        }
        if text.trim().is_empty() {
            return Err(CivicMapError::Validation(
                "suggestion text is required".to_string(),
            ));
        }
        let current = self
            .cache
            .get(issue_id)
            .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")))?
            .clone();

        let patch = IssuePatch {
            add_suggestion: Some(Suggestion {
                id: Issue::new_suggestion_id(),
                user_id: author.user_id.clone(),
                user_name: author.display_name.clone(),
                text: text.trim().to_string(),
                created_at: Utc::now(),
            }),
            ..Default::default()
        };
        self.apply_mutation(&current, issue_id, patch).await
    }

    /// Admin status update. The lifecycle is monotonic in intent only;
    /// any status can be set.
    pub async fn set_status(
        &mut self,
        issue_id: &str,
        status: IssueStatus,
    ) -> Result<Issue, CivicMapError> {
        let current = self
            .cache
            .get(issue_id)
            .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")))?
            .clone();
        let patch = IssuePatch {
            status: Some(status),
            ..Default::default()
        };
        self.apply_mutation(&current, issue_id, patch).await
    }

    /// Delete an issue. Only the reporter or an admin may delete, and
    /// demo-seeded issues are never deletable by anyone.
    pub async fn delete(
        &mut self,
        caller_user_id: &str,
        is_admin: bool,
        issue_id: &str,
    ) -> Result<(), CivicMapError> {
        let issue = self
            .cache
            .get(issue_id)
            .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")))?;

        if issue.is_demo() {
            return Err(CivicMapError::Forbidden(
                "demo issues cannot be deleted".to_string(),
            ));
        }
        if !is_admin && issue.reporter.user_id != caller_user_id {
            return Err(CivicMapError::Forbidden(
                "only the reporter or an admin can delete an issue".to_string(),
            ));
        }

        if self.online {
            self.store.delete(issue_id).await?;
        } else {
            self.queue.enqueue(PendingMutation::Delete {
                id: issue_id.to_string(),
            })?;
        }
        self.cache.remove(issue_id);
        Ok(())
    }

    /// Shared patch path. Demo issues change in the cache only; remote
    /// issues go store-first while online and queue while offline.
    async fn apply_mutation(
        &mut self,
        current: &Issue,
        issue_id: &str,
        patch: IssuePatch,
    ) -> Result<Issue, CivicMapError> {
        if current.is_demo() {
            self.cache.apply_patch(issue_id, &patch);
            return self
                .cache
                .get(issue_id)
                .cloned()
                .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")));
        }

        if self.online {
            let confirmed = self.store.update(issue_id, &patch).await?;
            self.cache.reconcile(confirmed.clone());
            Ok(confirmed)
        } else {
            self.queue.enqueue(PendingMutation::Update {
                id: issue_id.to_string(),
                patch: patch.clone(),
            })?;
            self.cache.apply_patch(issue_id, &patch);
            self.cache
                .get(issue_id)
                .cloned()
                .ok_or_else(|| CivicMapError::NotFound(format!("issue {issue_id}")))
        }
    }
}
