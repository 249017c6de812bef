//! Folder model for storage and API.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Name given to the folder created automatically for every new account.
pub const DEFAULT_FOLDER_NAME: &str = "My Snippets";

/// Named snippet container, exclusively owned by one user.
///
/// A unique compound index on `(user_id, name)` guarantees no two folders
/// share a name within one account; the same name may exist for different
/// users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Display name, stored trimmed and non-empty
    pub name: String,
    pub user_id: ObjectId,
    /// Creation timestamp (RFC 3339); folder listings sort on this
    pub created_at: String,
    pub updated_at: String,
}

impl Folder {
    pub fn new(name: String, user_id: ObjectId) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: None,
            name,
            user_id,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
