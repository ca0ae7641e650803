use chrono::{Duration, Utc};

use crate::types::{GeoPoint, Issue, IssueCategory, IssueStatus, Reporter};

/// Reserved prefix for demo-seeded issue ids. Records carrying it are
/// shown to every visitor but never written to or removed from the
/// remote store.
pub const DEMO_ID_PREFIX: &str = "demo-";

/// The fixed demo dataset: one issue per lifecycle stage, placed around
/// Delhi. Always listed ahead of remote issues.
pub fn demo_issues() -> Vec<Issue> {
    let now = Utc::now();
    vec![
        Issue {
            id: format!("{DEMO_ID_PREFIX}1"),
            reporter: Reporter {
                user_id: "demo".to_string(),
                display_name: "Rajesh Kumar".to_string(),
            },
            title: "Road Damage - Connaught Place".to_string(),
            category: IssueCategory::Pothole,
            description: "Large crater-sized pothole on CP road causing traffic congestion. \
                          Needs immediate attention."
                .to_string(),
            location: GeoPoint { lat: 28.7041, lng: 77.1025 },
            address: None,
            photos: Vec::new(),
            status: IssueStatus::Reported,
            created_at: now - Duration::days(2),
            upvotes: 12,
            downvotes: 0,
            suggestions: Vec::new(),
        },
        Issue {
            id: format!("{DEMO_ID_PREFIX}2"),
            reporter: Reporter {
                user_id: "demo".to_string(),
                display_name: "Priya Singh".to_string(),
            },
            title: "Signal Malfunction - Kasturba Nagar".to_string(),
            category: IssueCategory::Traffic,
            description: "Traffic signal at Kasturba Nagar junction is malfunctioning. \
                          Causing traffic problems."
                .to_string(),
            location: GeoPoint { lat: 28.6129, lng: 77.2295 },
            address: None,
            photos: Vec::new(),
            status: IssueStatus::InProgress,
            created_at: now - Duration::days(1),
            upvotes: 8,
            downvotes: 0,
            suggestions: Vec::new(),
        },
        Issue {
            id: format!("{DEMO_ID_PREFIX}3"),
            reporter: Reporter {
                user_id: "demo".to_string(),
                display_name: "Amit Patel".to_string(),
            },
            title: "Street Light Repaired - Greater Kailash".to_string(),
            category: IssueCategory::StreetLight,
            description: "Broken street light at Greater Kailash has been successfully \
                          repaired by municipal team."
                .to_string(),
            location: GeoPoint { lat: 28.5355, lng: 77.3910 },
            address: None,
            photos: Vec::new(),
            status: IssueStatus::Resolved,
            created_at: now - Duration::hours(3),
            upvotes: 5,
            downvotes: 0,
            suggestions: Vec::new(),
        },
    ]
}
