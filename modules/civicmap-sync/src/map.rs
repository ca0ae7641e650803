use geohash::Coord;
use tracing::warn;

use civicmap_common::{GeoPoint, Issue, IssueCategory, IssueStatus};

/// Clustering is disabled at and above this zoom level; below it nearby
/// markers collapse into cluster glyphs.
pub const CLUSTER_DISABLE_ZOOM: u8 = 16;

/// One map pin for an issue with a valid coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub issue_id: String,
    pub title: String,
    pub category: IssueCategory,
    pub status: IssueStatus,
    pub location: GeoPoint,
    pub upvotes: u32,
    pub photo: Option<String>,
}

/// Nearby markers collapsed into one glyph below the zoom threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub center: GeoPoint,
    pub count: usize,
    pub issue_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapFeature {
    Marker(Marker),
    Cluster(Cluster),
}

/// Fixed status palette used by the marker glyphs.
pub fn status_color(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Reported => "#F59E0B",
        IssueStatus::InProgress => "#EF4444",
        IssueStatus::Resolved => "#10B981",
    }
}

/// Project issues onto markers. Issues without a placeable coordinate
/// are skipped. The whole set is rebuilt on every call; nothing is
/// diffed incrementally.
pub fn markers(issues: &[Issue]) -> Vec<Marker> {
    issues
        .iter()
        .filter(|issue| issue.location.is_valid())
        .map(|issue| Marker {
            issue_id: issue.id.clone(),
            title: issue.title.clone(),
            category: issue.category,
            status: issue.status,
            location: issue.location,
            upvotes: issue.upvotes,
            photo: issue.photos.first().cloned(),
        })
        .collect()
}

/// Geohash precision for a zoom level: coarser cells when zoomed out.
fn cell_precision(zoom: u8) -> usize {
    match zoom {
        0..=4 => 2,
        5..=7 => 3,
        8..=10 => 4,
        11..=13 => 5,
        _ => 6,
    }
}

/// Bucket markers into geohash cells for the given zoom. Cells holding a
/// single marker stay plain markers; cells holding more collapse into a
/// cluster at the members' centroid. At or above `CLUSTER_DISABLE_ZOOM`
/// every marker stays individual.
pub fn cluster(markers: Vec<Marker>, zoom: u8) -> Vec<MapFeature> {
    if zoom >= CLUSTER_DISABLE_ZOOM {
        return markers.into_iter().map(MapFeature::Marker).collect();
    }

    let precision = cell_precision(zoom);

    // First-seen cell order keeps the output deterministic.
    let mut cells: Vec<(String, Vec<Marker>)> = Vec::new();
    for marker in markers {
        let coord = Coord {
            x: marker.location.lng,
            y: marker.location.lat,
        };
        let hash = match geohash::encode(coord, precision) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(issue = %marker.issue_id, error = %e, "Marker not bucketable; left unclustered");
                cells.push((format!("!{}", marker.issue_id), vec![marker]));
                continue;
            }
        };
        match cells.iter_mut().find(|(cell, _)| *cell == hash) {
            Some((_, members)) => members.push(marker),
            None => cells.push((hash, vec![marker])),
        }
    }

    cells
        .into_iter()
        .map(|(_, mut members)| {
            if members.len() == 1 {
                MapFeature::Marker(members.remove(0))
            } else {
                let count = members.len();
                let lat = members.iter().map(|m| m.location.lat).sum::<f64>() / count as f64;
                let lng = members.iter().map(|m| m.location.lng).sum::<f64>() / count as f64;
                MapFeature::Cluster(Cluster {
                    center: GeoPoint { lat, lng },
                    count,
                    issue_ids: members.into_iter().map(|m| m.issue_id).collect(),
                })
            }
        })
        .collect()
}

/// GeoJSON FeatureCollection for the map widget.
pub fn to_geojson(features: &[MapFeature]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = features
        .iter()
        .map(|feature| match feature {
            MapFeature::Marker(m) => serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [m.location.lng, m.location.lat]
                },
                "properties": {
                    "kind": "issue",
                    "id": m.issue_id,
                    "title": m.title,
                    "category": m.category.to_string(),
                    "status": m.status.to_string(),
                    "color": status_color(m.status),
                    "upvotes": m.upvotes,
                    "photo": m.photo,
                }
            }),
            MapFeature::Cluster(c) => serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [c.center.lng, c.center.lat]
                },
                "properties": {
                    "kind": "cluster",
                    "count": c.count,
                    "issueIds": c.issue_ids,
                }
            }),
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use civicmap_common::Reporter;

    fn issue_at(id: &str, lat: f64, lng: f64) -> Issue {
        Issue {
            id: id.to_string(),
            reporter: Reporter::anonymous(),
            title: id.to_string(),
            category: IssueCategory::Pothole,
            description: String::new(),
            location: GeoPoint { lat, lng },
            address: None,
            photos: Vec::new(),
            status: IssueStatus::Reported,
            created_at: Utc::now(),
            upvotes: 0,
            downvotes: 0,
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn invalid_coordinates_produce_no_marker() {
        let issues = vec![
            issue_at("good", 28.6, 77.2),
            issue_at("bad", 120.0, 77.2),
            issue_at("nan", f64::NAN, 77.2),
        ];
        let markers = markers(&issues);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].issue_id, "good");
    }

    #[test]
    fn nearby_markers_cluster_when_zoomed_out() {
        let issues = vec![
            issue_at("a", 28.6001, 77.2001),
            issue_at("b", 28.6002, 77.2002),
            issue_at("far", 19.0760, 72.8777),
        ];
        let features = cluster(markers(&issues), 6);

        let clusters: Vec<&Cluster> = features
            .iter()
            .filter_map(|f| match f {
                MapFeature::Cluster(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
        assert!(clusters[0].issue_ids.contains(&"a".to_string()));

        let singles = features
            .iter()
            .filter(|f| matches!(f, MapFeature::Marker(_)))
            .count();
        assert_eq!(singles, 1);
    }

    #[test]
    fn no_clustering_at_high_zoom() {
        let issues = vec![
            issue_at("a", 28.6001, 77.2001),
            issue_at("b", 28.6002, 77.2002),
        ];
        let features = cluster(markers(&issues), CLUSTER_DISABLE_ZOOM);
        assert!(features.iter().all(|f| matches!(f, MapFeature::Marker(_))));
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn geojson_uses_lng_lat_order_and_status_colors() {
        let issues = vec![issue_at("a", 28.6, 77.2)];
        let geojson = to_geojson(&cluster(markers(&issues), CLUSTER_DISABLE_ZOOM));

        let feature = &geojson["features"][0];
        assert_eq!(feature["geometry"]["coordinates"][0], 77.2);
        assert_eq!(feature["geometry"]["coordinates"][1], 28.6);
        assert_eq!(feature["properties"]["color"], "#F59E0B");
    }
}
