use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use civicmap_common::{CivicMapError, Issue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Up,
    Down,
}

/// Counter adjustment produced by a vote transition. Both fields are
/// applied to the issue as one unit; there is no observable state where
/// only one of them has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteDelta {
    pub up: i32,
    pub down: i32,
}

impl VoteDelta {
    pub fn is_noop(&self) -> bool {
        self.up == 0 && self.down == 0
    }

    /// Apply to an issue's counters, clamping at zero.
    pub fn apply_to(&self, issue: &mut Issue) {
        issue.upvotes = (issue.upvotes as i64 + self.up as i64).max(0) as u32;
        issue.downvotes = (issue.downvotes as i64 + self.down as i64).max(0) as u32;
    }
}

fn transition(current: Option<VoteChoice>, next: Option<VoteChoice>) -> VoteDelta {
    let weight = |v: Option<VoteChoice>, choice: VoteChoice| -> i32 {
        if v == Some(choice) {
            1
        } else {
            0
        }
    };
    VoteDelta {
        up: weight(next, VoteChoice::Up) - weight(current, VoteChoice::Up),
        down: weight(next, VoteChoice::Down) - weight(current, VoteChoice::Down),
    }
}

/// Per-user vote state, one active value per issue, persisted to a JSON
/// file keyed by user id and loaded at session start. Anonymous sessions
/// hold no ledger and every vote is rejected.
pub struct VoteLedger {
    user_id: Option<String>,
    path: Option<PathBuf>,
    votes: HashMap<String, VoteChoice>,
}

impl VoteLedger {
    /// Ledger for an authenticated user, loading any previously saved
    /// votes from the data dir.
    pub fn open(data_dir: &Path, user_id: &str) -> Result<Self, CivicMapError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| CivicMapError::Queue(format!("creating {}: {e}", data_dir.display())))?;
        let path = data_dir.join(format!("civic-votes-{user_id}.json"));

        let votes = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| CivicMapError::Queue(format!("reading vote ledger: {e}")))?;
            match serde_json::from_str(&raw) {
                Ok(votes) => votes,
                Err(e) => {
                    warn!(error = %e, user = user_id, "Vote ledger corrupt; starting empty");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            user_id: Some(user_id.to_string()),
            path: Some(path),
            votes,
        })
    }

    /// Ledger for an unauthenticated session: reads are empty and every
    /// `set_vote` fails with `AuthRequired`.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            path: None,
            votes: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn get(&self, issue_id: &str) -> Option<VoteChoice> {
        self.votes.get(issue_id).copied()
    }

    /// Record a vote transition and return the counter delta to apply to
    /// the issue. Idempotent: repeating the active vote yields a no-op
    /// delta. `None` clears the vote.
    pub fn set_vote(
        &mut self,
        issue_id: &str,
        vote: Option<VoteChoice>,
    ) -> Result<VoteDelta, CivicMapError> {
        if self.user_id.is_none() {
            return Err(CivicMapError::AuthRequired);
        }

        let current = self.get(issue_id);
        let delta = transition(current, vote);
        if current == vote {
            return Ok(delta);
        }

        match vote {
            Some(choice) => {
                self.votes.insert(issue_id.to_string(), choice);
            }
            None => {
                self.votes.remove(issue_id);
            }
        }
        self.persist()?;
        Ok(delta)
    }

    /// Toggle semantics used by the vote buttons: clicking the active
    /// choice clears it, anything else switches to it.
    pub fn toggle(&mut self, issue_id: &str, choice: VoteChoice) -> Result<VoteDelta, CivicMapError> {
        let next = if self.get(issue_id) == Some(choice) {
            None
        } else {
            Some(choice)
        };
        self.set_vote(issue_id, next)
    }

    fn persist(&self) -> Result<(), CivicMapError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.votes)
            .map_err(|e| CivicMapError::Queue(format!("serializing vote ledger: {e}")))?;
        fs::write(path, json)
            .map_err(|e| CivicMapError::Queue(format!("writing vote ledger: {e}")))
    }
}
