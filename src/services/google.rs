// SPDX-License-Identifier: MIT

//! Google sign-in: authorization-code exchange and ID token verification.
//!
//! The client is a constructed instance carried in `AppState`, never
//! process-global state, so tests can build their own and configuration
//! stays in one place.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const JWKS_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Verified identity extracted from a Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize)]
struct GoogleIdTokenClaims {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    #[allow(dead_code)]
    sub: String,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kty: String,
    kid: String,
    n: String,
    e: String,
    alg: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
}

struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// OAuth client for Google sign-in.
pub struct GoogleAuthClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleAuthClient {
    pub fn new(client_id: String, client_secret: String) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            client_id,
            client_secret,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// URL the browser is redirected to for consent.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20profile%20email&state={}",
            AUTH_ENDPOINT,
            self.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens and verify the ID token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> anyhow::Result<GoogleProfile> {
        let response = self
            .http_client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("token exchange returned status {}", response.status());
        }

        let tokens: TokenResponse = response.json().await?;
        self.verify_id_token(&tokens.id_token).await
    }

    /// Verify an ID token's signature against Google's JWKS and extract the
    /// profile claims.
    pub async fn verify_id_token(&self, id_token: &str) -> anyhow::Result<GoogleProfile> {
        let header = decode_header(id_token)?;
        if header.alg != Algorithm::RS256 {
            anyhow::bail!("unexpected JWT alg: {:?}", header.alg);
        }
        let kid = header
            .kid
            .ok_or_else(|| anyhow::anyhow!("missing JWT kid"))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(id_token, decoding_key.as_ref(), &validation)?;
        let claims = token_data.claims;

        if claims.email_verified != Some(true) {
            anyhow::bail!("Google account email is not verified");
        }

        let email = claims
            .email
            .ok_or_else(|| anyhow::anyhow!("missing email claim"))?
            .trim()
            .to_lowercase();

        let (first_name, last_name) = split_display_name(claims.name.as_deref().unwrap_or(""));

        Ok(GoogleProfile {
            email,
            first_name,
            last_name,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> anyhow::Result<Arc<DecodingKey>> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // One refresh on cache miss, one forced retry in case Google rotated
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        anyhow::bail!("JWT kid not found in JWKS after refresh: {kid}")
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> anyhow::Result<()> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = JWKS_URL, "Refreshing Google JWKS cache");

        let response = self.http_client.get(JWKS_URL).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("JWKS request returned status {}", response.status());
        }

        let jwks: Jwks = response.json().await?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            anyhow::bail!("JWKS response did not include any usable RSA keys");
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + JWKS_CACHE_TTL,
        });

        Ok(())
    }
}

/// Split a Google display name into first/last. A single word becomes the
/// first name; otherwise the last word is the last name.
pub fn split_display_name(name: &str) -> (String, String) {
    let mut parts: Vec<&str> = name.split_whitespace().collect();
    match parts.len() {
        0 => (String::new(), String::new()),
        1 => (parts[0].to_string(), String::new()),
        _ => {
            let last = parts.pop().unwrap_or_default().to_string();
            (parts.join(" "), last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_display_name() {
        assert_eq!(
            split_display_name("Ada Lovelace"),
            ("Ada".to_string(), "Lovelace".to_string())
        );
        assert_eq!(
            split_display_name("Ada"),
            ("Ada".to_string(), String::new())
        );
        assert_eq!(
            split_display_name("Jean Luc Picard"),
            ("Jean Luc".to_string(), "Picard".to_string())
        );
        assert_eq!(split_display_name(""), (String::new(), String::new()));
    }

    #[test]
    fn test_authorize_url_contains_params() {
        let client =
            GoogleAuthClient::new("client-id".to_string(), "secret".to_string()).unwrap();
        let url = client.authorize_url("http://localhost:5000/api/auth/google/callback", "st8");

        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=st8"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000"));
    }
}
