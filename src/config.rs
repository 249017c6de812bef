//! Application configuration loaded from environment variables.
//!
//! All values are read once at startup; handlers only ever see the cached
//! `Config` carried in `AppState`.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// MongoDB connection string
    pub mongodb_uri: String,
    /// MongoDB database name
    pub mongodb_database: String,
    /// Frontend URL for CORS and OAuth redirects
    pub frontend_url: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Key for signing the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Whether snippet creation requires a description.
    ///
    /// The upstream API required it on one route variant and not the other;
    /// here it is a single explicit switch, off by default.
    pub require_description: bool,

    // --- Google sign-in (optional; routes disabled when unset) ---
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,

    // --- SMTP for OTP delivery (optional; OTP is logged when unset) ---
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            mongodb_uri: env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "snipstash".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            require_description: env::var("REQUIRE_DESCRIPTION")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").ok(),
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            port: 5000,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "snipstash-test".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            require_description: false,
            google_client_id: None,
            google_client_secret: None,
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share REQUIRE_DESCRIPTION, so they live in one test; tests
    // in one binary run concurrently and the process environment is shared
    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!!");
        env::set_var("OAUTH_STATE_KEY", "test_oauth_state_key");
        env::remove_var("PORT");
        env::remove_var("REQUIRE_DESCRIPTION");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.port, 5000);
        assert_eq!(config.mongodb_database, "snipstash");
        assert!(!config.require_description);

        env::set_var("REQUIRE_DESCRIPTION", "true");
        let config = Config::from_env().expect("Config should load");
        assert!(config.require_description);

        env::remove_var("REQUIRE_DESCRIPTION");
    }
}
