use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use civicmap_common::Config;
use civicmap_sync::{HttpIssueStore, IssueService, IssueStore, MemoryIssueStore};

mod auth;
mod images;
mod rest;
mod signature;
mod stats;

use auth::JwtService;
use images::ImageStore;

pub struct AppState {
    pub config: Config,
    pub service: Mutex<IssueService>,
    pub images: ImageStore,
    pub jwt: JwtService,
    pub rate_limiter: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("civicmap=info".parse()?))
        .init();

    let config = Config::from_env();

    let store: Arc<dyn IssueStore> = if config.store_url.is_empty() {
        warn!("ISSUE_STORE_URL not set; using in-memory store (demo mode)");
        Arc::new(MemoryIssueStore::new())
    } else {
        Arc::new(HttpIssueStore::new(config.store_url.clone()))
    };

    let mut service = IssueService::new(store, &config.data_dir)?;
    service.refresh().await;

    let state = Arc::new(AppState {
        jwt: JwtService::new(&config.session_secret, "civicmap".to_string()),
        images: ImageStore::from_config(&config),
        service: Mutex::new(service),
        rate_limiter: Mutex::new(HashMap::new()),
        config: config.clone(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/login", post(rest::api_login))
        // Issues
        .route("/api/issues", get(rest::api_issues))
        .route("/api/issues", post(rest::submit::api_submit))
        .route("/api/issues/geojson", get(rest::api_issues_geojson))
        .route("/api/issues/{id}", get(rest::api_issue_detail))
        .route("/api/issues/{id}", delete(rest::api_delete_issue))
        .route("/api/issues/{id}/vote", post(rest::api_vote))
        .route("/api/issues/{id}/suggestions", post(rest::api_add_suggestion))
        .route("/api/issues/{id}/status", patch(rest::api_set_status))
        // Uploads
        .route("/api/uploads/signature", post(signature::api_upload_signature))
        // Admin
        .route("/api/admin/stats", get(rest::api_admin_stats))
        .route("/api/admin/connectivity", post(rest::api_set_connectivity))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path only (no query params, no IP)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("CivicMap API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
