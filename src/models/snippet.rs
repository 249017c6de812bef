//! Snippet model for storage and API.

use crate::services::conflict::normalize_key;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Reusable text snippet keyed by a shortcut string.
///
/// `shortcut_key_normalized` is the trimmed, lowercased form of
/// `shortcut_key`, maintained on every write. It carries the unique compound
/// index `(user_id, shortcut_key_normalized)` that backstops the conflict
/// scan against exact-duplicate insert races; prefix relationships cannot be
/// indexed and are handled by the scan alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    /// Owning folder; must belong to the same user
    pub folder_id: ObjectId,
    /// Trigger text as the user typed it (trimmed)
    pub shortcut_key: String,
    pub shortcut_key_normalized: String,
    pub description: Option<String>,
    /// Expansion text (trimmed, non-empty)
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Snippet {
    pub fn new(
        user_id: ObjectId,
        folder_id: ObjectId,
        shortcut_key: String,
        content: String,
        description: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let shortcut_key_normalized = normalize_key(&shortcut_key);
        Self {
            id: None,
            user_id,
            folder_id,
            shortcut_key,
            shortcut_key_normalized,
            description,
            content,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
