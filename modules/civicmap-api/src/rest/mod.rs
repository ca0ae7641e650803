pub mod submit;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use civicmap_common::{CivicMapError, IssueCategory, IssueStatus};
use civicmap_sync::{cluster, markers, to_geojson, IssueFilter, SortKey, VoteChoice, VoteLedger};

use crate::auth::{AdminUser, AuthUser};
use crate::stats::compute_stats;
use crate::AppState;

// --- Query structs ---

#[derive(Deserialize, Default)]
pub struct IssuesQuery {
    status: Option<String>,
    search: Option<String>,
    categories: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct GeoJsonQuery {
    zoom: Option<u8>,
    status: Option<String>,
    search: Option<String>,
    categories: Option<String>,
    sort: Option<String>,
}

impl GeoJsonQuery {
    fn filter_query(&self) -> IssuesQuery {
        IssuesQuery {
            status: self.status.clone(),
            search: self.search.clone(),
            categories: self.categories.clone(),
            sort: self.sort.clone(),
        }
    }
}

// --- Helpers ---

fn parse_categories(csv: &str) -> HashSet<IssueCategory> {
    csv.split(',').filter_map(IssueCategory::parse).collect()
}

pub fn to_filter(query: &IssuesQuery) -> IssueFilter {
    IssueFilter {
        status: query.status.as_deref().and_then(IssueStatus::parse),
        search: query.search.clone().unwrap_or_default(),
        categories: query
            .categories
            .as_deref()
            .map(parse_categories)
            .unwrap_or_default(),
        sort: query
            .sort
            .as_deref()
            .and_then(SortKey::parse)
            .unwrap_or_default(),
    }
}

/// Map domain errors onto HTTP statuses. Store failures on the write
/// path surface as 502; the read path never calls this (it degrades to
/// the cached view instead).
pub fn error_response(e: CivicMapError) -> Response {
    let status = match &e {
        CivicMapError::Validation(_) => StatusCode::BAD_REQUEST,
        CivicMapError::AuthRequired => StatusCode::UNAUTHORIZED,
        CivicMapError::Forbidden(_) => StatusCode::FORBIDDEN,
        CivicMapError::NotFound(_) => StatusCode::NOT_FOUND,
        CivicMapError::Store(_) | CivicMapError::ImageUpload(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}

// --- Read handlers ---

pub async fn api_issues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IssuesQuery>,
) -> impl IntoResponse {
    let service = state.service.lock().await;
    let issues = service.filtered(&to_filter(&query));
    Json(issues).into_response()
}

pub async fn api_issues_geojson(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeoJsonQuery>,
) -> impl IntoResponse {
    let service = state.service.lock().await;
    let issues = service.filtered(&to_filter(&query.filter_query()));
    let zoom = query.zoom.unwrap_or(12);
    let features = cluster(markers(&issues), zoom);
    Json(to_geojson(&features)).into_response()
}

pub async fn api_issue_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let service = state.service.lock().await;
    match service.get(&id) {
        Some(issue) => Json(issue.clone()).into_response(),
        None => error_response(CivicMapError::NotFound(format!("issue {id}"))),
    }
}

// --- Mutation handlers ---

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
    None,
}

impl From<VoteValue> for Option<VoteChoice> {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Up => Some(VoteChoice::Up),
            VoteValue::Down => Some(VoteChoice::Down),
            VoteValue::None => None,
        }
    }
}

#[derive(Deserialize)]
pub struct VoteRequest {
    vote: VoteValue,
}

pub async fn api_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(claims): AuthUser,
    Json(body): Json<VoteRequest>,
) -> impl IntoResponse {
    let mut ledger = match VoteLedger::open(&state.config.data_dir, &claims.sub) {
        Ok(ledger) => ledger,
        Err(e) => return error_response(e),
    };

    let mut service = state.service.lock().await;
    match service.set_vote(&mut ledger, &id, body.vote.into()).await {
        Ok(issue) => Json(issue).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct SuggestionRequest {
    text: String,
}

pub async fn api_add_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(claims): AuthUser,
    Json(body): Json<SuggestionRequest>,
) -> impl IntoResponse {
    let author = civicmap_common::Reporter {
        user_id: claims.sub.clone(),
        display_name: claims.name.clone(),
    };
    let mut service = state.service.lock().await;
    match service.add_suggestion(&author, &id, &body.text).await {
        Ok(issue) => Json(issue).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

pub async fn api_set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AdminUser(_): AdminUser,
    Json(body): Json<StatusRequest>,
) -> impl IntoResponse {
    let Some(status) = IssueStatus::parse(&body.status) else {
        return error_response(CivicMapError::Validation(format!(
            "unknown status {:?}",
            body.status
        )));
    };
    let mut service = state.service.lock().await;
    match service.set_status(&id, status).await {
        Ok(issue) => Json(issue).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_delete_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(claims): AuthUser,
) -> impl IntoResponse {
    let mut service = state.service.lock().await;
    match service.delete(&claims.sub, claims.is_admin, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// --- Admin handlers ---

pub async fn api_admin_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> impl IntoResponse {
    let mut service = state.service.lock().await;
    service.refresh().await;
    Json(compute_stats(service.issues())).into_response()
}

#[derive(Deserialize)]
pub struct ConnectivityRequest {
    online: bool,
}

/// Flip the service's connectivity. The offline→online transition drains
/// the queue. Mostly exercised in demo mode; production deployments stay
/// online and only queue on detected store failures at submit time.
pub async fn api_set_connectivity(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Json(body): Json<ConnectivityRequest>,
) -> impl IntoResponse {
    let mut service = state.service.lock().await;
    service.set_online(body.online).await;
    Json(serde_json::json!({
        "online": service.is_online(),
        "pending": service.pending(),
    }))
    .into_response()
}

// --- Auth ---

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex"))
}

/// Admin login: checks the configured credential pair and issues a JWT
/// carrying the admin role. Citizen tokens come from the identity
/// provider, not from this endpoint.
pub async fn api_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    let email = body.email.trim();
    if !email_regex().is_match(email) {
        return error_response(CivicMapError::Validation(
            "malformed email address".to_string(),
        ));
    }

    if email != state.config.admin_email || body.password != state.config.admin_password {
        warn!("Failed admin login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid credentials"})),
        )
            .into_response();
    }

    match state.jwt.create_token(email, "Administrator", true) {
        Ok(token) => {
            info!("Admin login");
            // Auth state changed; reload the issue view.
            state.service.lock().await.refresh().await;
            Json(serde_json::json!({"token": token})).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Token creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Token creation failed"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_csv_parsing_skips_unknowns() {
        let parsed = parse_categories("water,garbage,unicorns");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&IssueCategory::Water));
        assert!(parsed.contains(&IssueCategory::Garbage));
    }

    #[test]
    fn filter_defaults_when_query_is_empty() {
        let filter = to_filter(&IssuesQuery::default());
        assert!(filter.status.is_none());
        assert!(filter.categories.is_empty());
        assert_eq!(filter.sort, SortKey::Newest);
    }

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(email_regex().is_match("admin@civicmap.org"));
        assert!(!email_regex().is_match("not-an-email"));
        assert!(!email_regex().is_match("spaces in@mail.com"));
    }
}
