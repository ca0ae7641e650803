use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::demo::DEMO_ID_PREFIX;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// A coordinate the map can actually place: finite and inside the
    /// valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Enums ---

/// Wire names are camelCase to match the remote document collection
/// ("streetLight", "inProgress"). Unrecognized category strings read
/// back as `Other` rather than failing the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueCategory {
    Pothole,
    Traffic,
    StreetLight,
    Water,
    Garbage,
    Pollution,
    Other,
}

impl<'de> Deserialize<'de> for IssueCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(IssueCategory::parse(&s).unwrap_or(IssueCategory::Other))
    }
}

impl Default for IssueCategory {
    fn default() -> Self {
        IssueCategory::Other
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueCategory::Pothole => write!(f, "pothole"),
            IssueCategory::Traffic => write!(f, "traffic"),
            IssueCategory::StreetLight => write!(f, "streetLight"),
            IssueCategory::Water => write!(f, "water"),
            IssueCategory::Garbage => write!(f, "garbage"),
            IssueCategory::Pollution => write!(f, "pollution"),
            IssueCategory::Other => write!(f, "other"),
        }
    }
}

impl IssueCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "pothole" => Some(IssueCategory::Pothole),
            "traffic" => Some(IssueCategory::Traffic),
            "streetLight" | "streetlight" => Some(IssueCategory::StreetLight),
            "water" => Some(IssueCategory::Water),
            "garbage" => Some(IssueCategory::Garbage),
            "pollution" => Some(IssueCategory::Pollution),
            "other" => Some(IssueCategory::Other),
            _ => None,
        }
    }
}

/// Intended to move forward (reported → inProgress → resolved) but not
/// enforced: an admin can set any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueStatus {
    Reported,
    InProgress,
    Resolved,
}

impl Default for IssueStatus {
    fn default() -> Self {
        IssueStatus::Reported
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueStatus::Reported => write!(f, "reported"),
            IssueStatus::InProgress => write!(f, "inProgress"),
            IssueStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl IssueStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "reported" => Some(IssueStatus::Reported),
            "inProgress" | "inprogress" => Some(IssueStatus::InProgress),
            "resolved" => Some(IssueStatus::Resolved),
            _ => None,
        }
    }
}

// --- Core records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub display_name: String,
}

impl Reporter {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            display_name: "Anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A single reported civic problem. Remote documents are duck-typed:
/// missing counters, photos, or suggestions deserialize to defaults
/// instead of failing the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    #[serde(flatten)]
    pub reporter: Reporter,
    pub title: String,
    #[serde(default)]
    pub category: IssueCategory,
    pub description: String,
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub upvotes: u32,
    #[serde(default)]
    pub downvotes: u32,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl Issue {
    /// Demo-seeded issues carry a reserved id prefix and are never
    /// persisted or deleted remotely.
    pub fn is_demo(&self) -> bool {
        self.id.starts_with(DEMO_ID_PREFIX)
    }

    pub fn new_id() -> String {
        format!("issue-{}", Uuid::new_v4())
    }

    pub fn new_suggestion_id() -> String {
        format!("suggestion-{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_names_are_camel_case() {
        let json = serde_json::to_string(&IssueCategory::StreetLight).unwrap();
        assert_eq!(json, "\"streetLight\"");
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"inProgress\"");
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let parsed: IssueCategory = serde_json::from_str("\"sinkhole\"").unwrap();
        assert_eq!(parsed, IssueCategory::Other);
    }

    #[test]
    fn issue_deserializes_with_missing_optional_fields() {
        let json = serde_json::json!({
            "id": "issue-1",
            "userId": "u1",
            "userName": "Asha",
            "title": "Broken drain",
            "description": "Overflowing after rain",
            "location": { "lat": 28.6, "lng": 77.2 },
            "createdAt": "2026-08-01T10:00:00Z",
        });
        let issue: Issue = serde_json::from_value(json).unwrap();
        assert_eq!(issue.status, IssueStatus::Reported);
        assert_eq!(issue.category, IssueCategory::Other);
        assert_eq!(issue.upvotes, 0);
        assert!(issue.photos.is_empty());
        assert!(issue.suggestions.is_empty());
    }

    #[test]
    fn geopoint_validity() {
        assert!(GeoPoint { lat: 28.7, lng: 77.1 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: f64::NAN, lng: 0.0 }.is_valid());
    }

    #[test]
    fn haversine_delhi_to_mumbai() {
        let d = haversine_km(28.7041, 77.1025, 19.0760, 72.8777);
        assert!((d - 1153.0).abs() < 20.0, "got {d}");
    }
}
