use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sha1::{Digest, Sha1};
use tracing::error;

use crate::AppState;

/// Sign an upload request the way the image store expects: the
/// alphabetically-sorted parameter string concatenated with the API
/// secret, SHA-1, hex. Only the timestamp parameter is signed.
pub fn sign_upload(timestamp: i64, api_secret: &str) -> String {
    let param_string = format!("timestamp={timestamp}");
    let digest = Sha1::digest(format!("{param_string}{api_secret}").as_bytes());
    hex::encode(digest)
}

/// POST /api/uploads/signature — issue a signed upload token so the
/// browser can talk to the image store without ever seeing the secret.
pub async fn api_upload_signature(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let api_secret = &state.config.image_api_secret;
    if api_secret.is_empty() {
        error!("IMAGE_API_SECRET is not set; cannot sign uploads");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Server configuration error"})),
        )
            .into_response();
    }

    let timestamp = chrono::Utc::now().timestamp();
    let signature = sign_upload(timestamp, api_secret);
    Json(serde_json::json!({
        "signature": signature,
        "timestamp": timestamp,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha1("timestamp=1700000000" + "test-secret")
        assert_eq!(
            sign_upload(1_700_000_000, "test-secret"),
            "786dad9264322b5b7c20002e24ea46fc00e05307"
        );
    }

    #[test]
    fn signature_depends_on_timestamp_and_secret() {
        assert_eq!(
            sign_upload(1_756_400_000, "api-secret"),
            "5597d9e15d0612ca42620a156dccefe53f114570"
        );
        assert_ne!(
            sign_upload(1_756_400_000, "api-secret"),
            sign_upload(1_756_400_001, "api-secret")
        );
        assert_ne!(
            sign_upload(1_756_400_000, "api-secret"),
            sign_upload(1_756_400_000, "other-secret")
        );
    }
}
