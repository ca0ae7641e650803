use serde::Serialize;

use civicmap_common::{Issue, IssueCategory, IssueStatus};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: IssueCategory,
    pub count: usize,
}

/// Aggregated analytics for the admin dashboard.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueStats {
    pub total: usize,
    pub reported: usize,
    pub in_progress: usize,
    pub resolved: usize,
    /// Percentage of issues resolved, rounded to whole percent.
    pub resolution_rate: u32,
    pub avg_upvotes: f64,
    pub categories: Vec<CategoryCount>,
}

pub fn compute_stats(issues: &[Issue]) -> IssueStats {
    let total = issues.len();
    let count_status =
        |status: IssueStatus| issues.iter().filter(|i| i.status == status).count();

    let reported = count_status(IssueStatus::Reported);
    let in_progress = count_status(IssueStatus::InProgress);
    let resolved = count_status(IssueStatus::Resolved);

    let resolution_rate = if total == 0 {
        0
    } else {
        ((resolved as f64 / total as f64) * 100.0).round() as u32
    };
    let avg_upvotes = if total == 0 {
        0.0
    } else {
        issues.iter().map(|i| i.upvotes as f64).sum::<f64>() / total as f64
    };

    let all_categories = [
        IssueCategory::Pothole,
        IssueCategory::Traffic,
        IssueCategory::StreetLight,
        IssueCategory::Water,
        IssueCategory::Garbage,
        IssueCategory::Pollution,
        IssueCategory::Other,
    ];
    let categories = all_categories
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: issues.iter().filter(|i| i.category == category).count(),
        })
        .filter(|c| c.count > 0)
        .collect();

    IssueStats {
        total,
        reported,
        in_progress,
        resolved,
        resolution_rate,
        avg_upvotes,
        categories,
    }
}
