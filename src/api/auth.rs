//! Back-office sessions.
//!
//! A session token is `<expiry unix seconds>.<hex HMAC-SHA256>` over
//! `admin:<email>:<expiry>`, keyed with the configured session secret.
//! Nothing is stored server side.

use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use validator::Validate;

use super::error::ApiError;
use super::extract::ValidatedJson;
use super::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Proof that the request carries a valid back-office token. Taking it as
/// the first extractor keeps unauthenticated requests away from the body
/// and the database.
#[derive(Clone, Debug)]
pub struct AdminSession {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

fn mac(secret: &str, message: &str) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac
}

fn claims(email: &str, expiry: i64) -> String {
    format!("admin:{}:{}", email.to_lowercase(), expiry)
}

pub fn issue_token(secret: &str, email: &str, expires_at: DateTime<Utc>) -> String {
    let expiry = expires_at.timestamp();
    let signature = mac(secret, &claims(email, expiry)).finalize().into_bytes();
    format!("{}.{}", expiry, hex::encode(signature))
}

/// Returns the expiry of a valid, unexpired token.
pub fn verify_token(secret: &str, email: &str, token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (expiry, signature) = token.split_once('.')?;
    let expiry: i64 = expiry.parse().ok()?;
    let signature = hex::decode(signature).ok()?;
    mac(secret, &claims(email, expiry)).verify_slice(&signature).ok()?;
    let expires_at = Utc.timestamp_opt(expiry, 0).single()?;
    (expires_at > now).then_some(expires_at)
}

/// Compares through an HMAC so the comparison time does not depend on
/// where the inputs differ.
fn secrets_match(secret: &str, given: &str, expected: &str) -> bool {
    let expected = mac(secret, expected).finalize().into_bytes();
    mac(secret, given).verify_slice(&expected).is_ok()
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthorized)?;

        let admin = &state.config.admin;
        let expires_at =
            verify_token(&admin.session_secret, &admin.email, token, Utc::now()).ok_or(ApiError::Unauthorized)?;
        Ok(Self { email: admin.email.clone(), expires_at })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let admin = &state.config.admin;
    let email_ok = secrets_match(&admin.session_secret, &request.email.to_lowercase(), &admin.email.to_lowercase());
    let password_ok = secrets_match(&admin.session_secret, &request.password, &admin.password);
    if !(email_ok && password_ok) {
        tracing::warn!(email = %request.email, "admin login refused");
        return Err(ApiError::Unauthorized);
    }

    let expires_at = Utc::now() + admin.session_ttl;
    tracing::info!(email = %admin.email, %expires_at, "admin session issued");
    Ok(Json(LoginResponse { token: issue_token(&admin.session_secret, &admin.email, expires_at), expires_at }))
}
