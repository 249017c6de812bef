// SPDX-License-Identifier: MIT

//! Account and session routes: register, login, password lifecycle, and
//! Google sign-in.

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE};
use crate::models::folder::DEFAULT_FOLDER_NAME;
use crate::models::{Folder, User, UserSettings};
use crate::AppState;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use mongodb::bson::{doc, Bson};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// OTP codes expire after 10 minutes.
const OTP_TTL_MINUTES: i64 = 10;

/// OAuth `state` parameters older than this are rejected.
const OAUTH_STATE_MAX_AGE_MILLIS: u128 = 10 * 60 * 1000;

const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = 50;
const PASSWORD_MIN_LEN: usize = 8;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", get(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/google", get(google_start))
        .route("/api/auth/google/callback", get(google_callback))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    token: String,
    user: UserSummary,
}

#[derive(Serialize)]
struct UserSummary {
    id: String,
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    settings: UserSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Deserialize)]
struct VerifyOtpRequest {
    email: String,
    otp: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    new_password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ─── Helpers ─────────────────────────────────────────────────

/// Hash a password or OTP with Argon2 (salted, self-describing hash string).
fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing failed: {}", e)))
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(secret.as_bytes(), &parsed))
        .is_ok()
}

/// 6-digit password-reset code.
fn generate_otp() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(7))
        .build()
}

fn validate_name(value: &str, label: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", label)));
    }
    if value.chars().count() < NAME_MIN_LEN || value.chars().count() > NAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            label, NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(value.to_string())
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<&str> {
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(password)
}

/// Create the default folder for a fresh account. Failure is logged, not
/// surfaced; the account itself is already committed.
async fn create_default_folder(state: &AppState, user_id: mongodb::bson::oid::ObjectId) {
    let folder = Folder::new(DEFAULT_FOLDER_NAME.to_string(), user_id);
    if let Err(e) = state.db.insert_folder(&folder).await {
        tracing::error!(user_id = %user_id, error = %e, "Failed creating default folder");
    }
}

// ─── Registration & Login ────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let first_name = validate_name(&body.first_name, "First name")?;
    let last_name = validate_name(&body.last_name, "Last name")?;
    let email = normalize_email(&body.email)?;
    let password = validate_password(&body.password)?;

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate("User already exists".to_string()));
    }

    let password_hash = hash_secret(password)?;
    let user = User::new(first_name, last_name, email.clone(), Some(password_hash));

    // A concurrent register with the same email loses at the unique index
    let user_id = state.db.insert_user(&user).await?;
    create_default_folder(&state, user_id).await;

    let token = create_jwt(user_id, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(token.clone()));

    tracing::info!(user_id = %user_id, "User registered");

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            token,
            user: UserSummary {
                id: user_id.to_hex(),
                email,
            },
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let email = normalize_email(&body.email)?;
    if body.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    // One error for both unknown email and wrong password
    let invalid = || AppError::Validation("Invalid credentials".to_string());

    let user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let password_hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_secret(&body.password, password_hash) {
        return Err(invalid());
    }

    let user_id = user
        .id
        .ok_or_else(|| AppError::Database("User document without id".to_string()))?;

    let token = create_jwt(user_id, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(token.clone()));

    Ok((
        jar,
        Json(SessionResponse {
            token,
            user: UserSummary {
                id: user_id.to_hex(),
                email: user.email,
            },
        }),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let user = state
        .db
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        id: auth.user_id.to_hex(),
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        settings: user.settings,
    }))
}

// ─── Password Lifecycle ──────────────────────────────────────

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    if body.old_password.is_empty() {
        return Err(AppError::Validation("Old password is required".to_string()));
    }
    let new_password = validate_password(&body.new_password)?;

    let user = state
        .db
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_secret(&body.old_password, hash));
    if !matches {
        return Err(AppError::Validation(
            "Old password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_secret(new_password)?;
    state
        .db
        .update_user_fields(auth.user_id, doc! { "password_hash": new_hash })
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&body.email)?;

    let user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let user_id = user
        .id
        .ok_or_else(|| AppError::Database("User document without id".to_string()))?;

    let otp = generate_otp();
    let otp_hash = hash_secret(&otp)?;
    let expires_at = (chrono::Utc::now() + chrono::Duration::minutes(OTP_TTL_MINUTES)).to_rfc3339();

    state
        .db
        .update_user_fields(
            user_id,
            doc! {
                "otp_hash": otp_hash,
                "otp_expires_at": expires_at,
                "otp_verified": false,
            },
        )
        .await?;

    // Only the hash is stored; the plaintext code goes to the user's inbox
    state.mailer.send_otp(&email, &otp).await?;

    Ok(Json(MessageResponse {
        message: "OTP sent to your email".to_string(),
    }))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&body.email)?;
    if body.otp.trim().is_empty() {
        return Err(AppError::Validation("OTP is required".to_string()));
    }

    // One error for every failure mode so the endpoint confirms nothing
    let invalid = || AppError::Validation("Invalid or expired OTP".to_string());

    let user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    let user_id = user
        .id
        .ok_or_else(|| AppError::Database("User document without id".to_string()))?;

    let otp_hash = user.otp_hash.as_deref().ok_or_else(invalid)?;
    let expires_at = user.otp_expires_at.as_deref().ok_or_else(invalid)?;

    let expires_at = chrono::DateTime::parse_from_rfc3339(expires_at)
        .map_err(|_| invalid())?
        .with_timezone(&chrono::Utc);
    if !verify_secret(body.otp.trim(), otp_hash) || expires_at < chrono::Utc::now() {
        return Err(invalid());
    }

    state
        .db
        .update_user_fields(
            user_id,
            doc! {
                "otp_verified": true,
                "otp_hash": Bson::Null,
                "otp_expires_at": Bson::Null,
            },
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "OTP verified. You can now reset your password.".to_string(),
    }))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&body.email)?;
    let new_password = validate_password(&body.new_password)?;

    let user = state.db.find_user_by_email(&email).await?;
    let user = match user {
        Some(user) if user.otp_verified => user,
        _ => {
            return Err(AppError::Validation(
                "OTP not verified or user not found".to_string(),
            ))
        }
    };
    let user_id = user
        .id
        .ok_or_else(|| AppError::Database("User document without id".to_string()))?;

    let new_hash = hash_secret(new_password)?;
    state
        .db
        .update_user_fields(
            user_id,
            doc! { "password_hash": new_hash, "otp_verified": false },
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password reset successful".to_string(),
    }))
}

// ─── Google Sign-In ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct GoogleCallbackParams {
    code: Option<String>,
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Build a signed OAuth `state` value: base64url("timestamp_hex|sig_hex").
fn sign_oauth_state(key: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();
    let payload = format!("{:x}", timestamp);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify an OAuth `state` value's signature and freshness.
fn verify_oauth_state(state: &str, key: &[u8]) -> bool {
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(state) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    let Some((payload, signature)) = decoded.split_once('|') else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload.as_bytes());
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    if mac.verify_slice(&signature).is_err() {
        return false;
    }

    let Ok(timestamp) = u128::from_str_radix(payload, 16) else {
        return false;
    };
    let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return false;
    };

    now.as_millis().saturating_sub(timestamp) <= OAUTH_STATE_MAX_AGE_MILLIS
}

/// Callback URL derived from the incoming request's Host header.
fn callback_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:5000");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/api/auth/google/callback", scheme, host)
}

/// Start the Google sign-in flow.
async fn google_start(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in not configured".to_string()))?;

    let oauth_state = sign_oauth_state(&state.config.oauth_state_key)?;
    let url = google.authorize_url(&callback_url(&headers), &oauth_state);

    tracing::info!("Starting Google sign-in, redirecting to consent screen");
    Ok(Redirect::temporary(&url))
}

/// Google callback: verify state, exchange the code, sign the user in
/// (creating the account on first login).
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    Query(params): Query<GoogleCallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in not configured".to_string()))?;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Google sign-in denied");
        let redirect = format!("{}?error={}", state.config.frontend_url, error);
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::Validation("Missing OAuth state".to_string()))?;
    if !verify_oauth_state(&oauth_state, &state.config.oauth_state_key) {
        return Err(AppError::Validation(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let profile = google
        .exchange_code(&code, &callback_url(&headers))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Google code exchange failed");
            AppError::Validation("Google sign-in failed".to_string())
        })?;

    let (user_id, has_password) = match state.db.find_user_by_email(&profile.email).await? {
        Some(user) => (
            user.id
                .ok_or_else(|| AppError::Database("User document without id".to_string()))?,
            user.password_hash.is_some(),
        ),
        None => {
            let user = User::new(
                profile.first_name,
                profile.last_name,
                profile.email.clone(),
                None,
            );
            let user_id = state.db.insert_user(&user).await?;
            create_default_folder(&state, user_id).await;
            tracing::info!(user_id = %user_id, "User created via Google sign-in");
            (user_id, false)
        }
    };

    let token = create_jwt(user_id, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(token));

    // Accounts without a local password are sent to set one first
    let destination = if has_password {
        format!("{}/dashboard", state.config.frontend_url)
    } else {
        format!("{}/set-password", state.config.frontend_url)
    };

    Ok((jar, Redirect::temporary(&destination)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_state_round_trip() {
        let key = b"test_oauth_state_key";
        let state = sign_oauth_state(key).unwrap();
        assert!(verify_oauth_state(&state, key));
    }

    #[test]
    fn test_oauth_state_rejects_wrong_key() {
        let state = sign_oauth_state(b"key_one").unwrap();
        assert!(!verify_oauth_state(&state, b"key_two"));
    }

    #[test]
    fn test_oauth_state_rejects_garbage() {
        assert!(!verify_oauth_state("not-base64!!", b"key"));
        assert!(!verify_oauth_state("", b"key"));
        let unsigned = URL_SAFE_NO_PAD.encode("deadbeef");
        assert!(!verify_oauth_state(&unsigned, b"key"));
    }

    #[test]
    fn test_secret_hash_round_trip() {
        let hash = hash_secret("hunter22").unwrap();
        assert!(verify_secret("hunter22", &hash));
        assert!(!verify_secret("hunter23", &hash));
    }

    #[test]
    fn test_generate_otp_is_six_digits() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("Al", "First name").is_ok());
        assert!(validate_name("A", "First name").is_err());
        assert!(validate_name("", "First name").is_err());
        assert!(validate_name(&"x".repeat(51), "First name").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(normalize_email("   ").is_err());
    }
}
