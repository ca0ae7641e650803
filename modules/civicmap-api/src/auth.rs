use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::AppState;

const TOKEN_DURATION_SECS: i64 = 24 * 3600; // 24 hours

/// JWT Claims stored in the token. Role comes from the identity
/// provider; there is no hardcoded credential check anywhere in the
/// request path.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// JWT service for creating and verifying tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Create a token. The `sub` claim is a deterministic UUID derived
    /// from the email hash, so no persistent user table is needed.
    pub fn create_token(&self, email: &str, name: &str, is_admin: bool) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(TOKEN_DURATION_SECS);

        let claims = Claims {
            sub: email_to_uuid(email).to_string(),
            email: email.to_string(),
            name: name.to_string(),
            is_admin,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a token. Returns claims if valid and not expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Deterministic user id for an email: UUID from the first 16 bytes of
/// its SHA-256 digest.
pub fn email_to_uuid(email: &str) -> Uuid {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn bearer_claims(parts: &Parts, state: &Arc<AppState>) -> Option<Claims> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let token = header.strip_prefix("Bearer ")?;
    state.jwt.verify_token(token).ok()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

/// Authenticated caller. Rejects the request with 401 when the bearer
/// token is missing or invalid.
pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, state)
            .map(AuthUser)
            .ok_or_else(|| unauthorized("Authentication required"))
    }
}

/// Caller identity when present; anonymous requests pass through.
pub struct MaybeUser(pub Option<Claims>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(bearer_claims(parts, state)))
    }
}

/// Admin-only extractor: a valid token whose `is_admin` claim is set.
pub struct AdminUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_claims(parts, state) {
            Some(claims) if claims.is_admin => Ok(AdminUser(claims)),
            Some(_) => Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({"error": "Admin role required"})),
            )
                .into_response()),
            None => Err(unauthorized("Authentication required")),
        }
    }
}
