use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{info, warn};

use civicmap_common::{CivicMapError, GeoPoint, IssueCategory, Reporter};
use civicmap_sync::NewIssue;

use crate::auth::MaybeUser;
use crate::rest::error_response;
use crate::AppState;

pub const RATE_LIMIT_PER_HOUR: usize = 10;
const MAX_PHOTOS: usize = 4;
const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Check rate limit for an IP. Returns true if the request is allowed, false if rate-limited.
/// Prunes expired entries and records the new request if allowed.
pub fn check_rate_limit(entries: &mut Vec<Instant>, now: Instant, max_per_hour: usize) -> bool {
    if let Some(cutoff) = now.checked_sub(std::time::Duration::from_secs(3600)) {
        entries.retain(|t| *t > cutoff);
    }
    if entries.len() >= max_per_hour {
        return false;
    }
    entries.push(now);
    true
}

fn prune_empty_entries(limiter: &mut HashMap<IpAddr, Vec<Instant>>) {
    let Some(cutoff) = Instant::now().checked_sub(std::time::Duration::from_secs(3600)) else {
        return;
    };
    limiter.retain(|_, entries| entries.iter().any(|t| *t > cutoff));
}

struct SubmitFields {
    title: String,
    description: String,
    category: IssueCategory,
    lat: Option<f64>,
    lng: Option<f64>,
    address: Option<String>,
    photos: Vec<(String, Vec<u8>)>,
}

async fn read_fields(multipart: &mut Multipart) -> Result<SubmitFields, CivicMapError> {
    let mut fields = SubmitFields {
        title: String::new(),
        description: String::new(),
        category: IssueCategory::Other,
        lat: None,
        lng: None,
        address: None,
        photos: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CivicMapError::Validation(format!("malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => fields.title = read_text(field).await?,
            "description" => fields.description = read_text(field).await?,
            "category" => {
                let raw = read_text(field).await?;
                fields.category = IssueCategory::parse(&raw).ok_or_else(|| {
                    CivicMapError::Validation(format!("unknown category {raw:?}"))
                })?;
            }
            "lat" => fields.lat = Some(read_number(field).await?),
            "lng" => fields.lng = Some(read_number(field).await?),
            "address" => fields.address = Some(read_text(field).await?),
            "photo" => {
                if fields.photos.len() >= MAX_PHOTOS {
                    return Err(CivicMapError::Validation(format!(
                        "at most {MAX_PHOTOS} photos per issue"
                    )));
                }
                let filename = field
                    .file_name()
                    .unwrap_or("photo.jpg")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CivicMapError::Validation(format!("unreadable photo: {e}")))?;
                if bytes.len() > MAX_PHOTO_BYTES {
                    return Err(CivicMapError::Validation(
                        "photo exceeds 5 MB limit".to_string(),
                    ));
                }
                fields.photos.push((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(fields)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, CivicMapError> {
    field
        .text()
        .await
        .map_err(|e| CivicMapError::Validation(format!("unreadable field: {e}")))
}

async fn read_number(field: axum::extract::multipart::Field<'_>) -> Result<f64, CivicMapError> {
    let raw = read_text(field).await?;
    raw.trim()
        .parse()
        .map_err(|_| CivicMapError::Validation(format!("not a number: {raw:?}")))
}

/// POST /api/issues — multipart submission. Photos are pushed to the
/// image store first; an upload failure degrades to a photo-less issue
/// instead of aborting. Anonymous reporters are allowed.
pub async fn api_submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    MaybeUser(claims): MaybeUser,
    mut multipart: Multipart,
) -> Response {
    // Rate limit: submissions per hour per IP.
    let ip = addr.ip();
    {
        let mut limiter = state.rate_limiter.lock().await;
        // Periodically prune to prevent unbounded HashMap growth
        if limiter.len() > 1000 {
            prune_empty_entries(&mut limiter);
        }
        let entries = limiter.entry(ip).or_default();
        if !check_rate_limit(entries, Instant::now(), RATE_LIMIT_PER_HOUR) {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({"error": "Rate limit exceeded. Try again later."})),
            )
                .into_response();
        }
    }

    let fields = match read_fields(&mut multipart).await {
        Ok(fields) => fields,
        Err(e) => return error_response(e),
    };
    let (Some(lat), Some(lng)) = (fields.lat, fields.lng) else {
        return error_response(CivicMapError::Validation(
            "lat and lng are required".to_string(),
        ));
    };

    // Upload photos before creating the issue; failures degrade.
    let mut photo_urls = Vec::new();
    for (filename, bytes) in fields.photos {
        match state.images.upload(bytes, &filename).await {
            Ok(uploaded) => photo_urls.push(uploaded.url),
            Err(e) => {
                warn!(error = %e, "Photo upload failed; submitting without it");
            }
        }
    }

    let reporter = match &claims {
        Some(claims) => Reporter {
            user_id: claims.sub.clone(),
            display_name: claims.name.clone(),
        },
        None => Reporter::anonymous(),
    };

    let new_issue = NewIssue {
        reporter,
        title: fields.title,
        category: fields.category,
        description: fields.description,
        location: GeoPoint { lat, lng },
        address: fields.address,
        photos: photo_urls,
    };

    let mut service = state.service.lock().await;
    match service.submit(new_issue).await {
        Ok(issue) => {
            info!(issue = %issue.id, queued = !service.is_online(), "Issue submitted");
            (StatusCode::CREATED, Json(issue)).into_response()
        }
        Err(e) => error_response(e),
    }
}
