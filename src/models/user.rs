//! User model for storage and API.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Per-user UI preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub animation_enabled: bool,
    pub sound_enabled: bool,
    /// "light" or "dark"
    pub theme: String,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            animation_enabled: true,
            sound_enabled: true,
            theme: "light".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Account document stored in the `users` collection.
///
/// `email` is stored trimmed and lowercased; a unique index enforces one
/// account per address. `password_hash` is `None` for accounts created via
/// Google sign-in that have not set a password yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    #[serde(default)]
    pub settings: UserSettings,
    /// Argon2 hash of the last password-reset OTP
    pub otp_hash: Option<String>,
    /// OTP expiry (RFC 3339)
    pub otp_expires_at: Option<String>,
    #[serde(default)]
    pub otp_verified: bool,
    /// When the account was created (RFC 3339)
    pub created_at: String,
    /// Last modification timestamp (RFC 3339)
    pub updated_at: String,
}

impl User {
    /// Build a new user document; timestamps are set to now.
    pub fn new(
        first_name: String,
        last_name: String,
        email: String,
        password_hash: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: None,
            first_name,
            last_name,
            email,
            password_hash,
            settings: UserSettings::default(),
            otp_hash: None,
            otp_expires_at: None,
            otp_verified: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
