use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use civicmap_common::{Issue, IssueCategory, IssueStatus};

/// Wire names match the sort selector values the UI sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "date")]
    Newest,
    #[serde(rename = "upvotes")]
    MostUpvoted,
    #[serde(rename = "activity")]
    MostActive,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "date" => Some(SortKey::Newest),
            "upvotes" => Some(SortKey::MostUpvoted),
            "activity" => Some(SortKey::MostActive),
            _ => None,
        }
    }
}

/// Pure derivation of the displayed subset. Applied in order: status
/// predicate, case-insensitive substring search over title, description
/// and reporter name, then category membership (empty set matches all).
/// Sorting is stable, so ties keep their cache order.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub search: String,
    pub categories: HashSet<IssueCategory>,
    pub sort: SortKey,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(status) = self.status {
            if issue.status != status {
                return false;
            }
        }

        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let haystack = || {
                [
                    issue.title.as_str(),
                    issue.description.as_str(),
                    issue.reporter.display_name.as_str(),
                ]
            };
            if !haystack().iter().any(|s| s.to_lowercase().contains(&needle)) {
                return false;
            }
        }

        if !self.categories.is_empty() && !self.categories.contains(&issue.category) {
            return false;
        }

        true
    }

    pub fn apply(&self, issues: &[Issue]) -> Vec<Issue> {
        let mut filtered: Vec<Issue> = issues.iter().filter(|i| self.matches(i)).cloned().collect();

        // Vec::sort_by is stable; equal keys keep cache order.
        match self.sort {
            SortKey::Newest => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortKey::MostUpvoted => filtered.sort_by(|a, b| b.upvotes.cmp(&a.upvotes)),
            SortKey::MostActive => {
                filtered.sort_by(|a, b| b.suggestions.len().cmp(&a.suggestions.len()))
            }
        }
        filtered
    }
}
