// SPDX-License-Identifier: MIT

//! MongoDB client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (accounts, credentials, OTP state)
//! - Folders (per-user named containers)
//! - Snippets (shortcut-keyed expansion entries)
//!
//! Every query that touches a folder or snippet is scoped by `user_id`, so
//! ownership is enforced at the filter level and a miss is indistinguishable
//! from absence.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Folder, Snippet, User};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::IndexModel;
use serde::Deserialize;

/// Mongo duplicate key error code (unique index violation).
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Pagination and sorting options for snippet listings.
#[derive(Debug, Clone)]
pub struct SnippetPage {
    pub limit: i64,
    pub skip: u64,
    /// Stored field name to sort on (already whitelisted by the caller)
    pub sort_field: String,
    pub descending: bool,
}

/// Projection target for the conflict scan: only the shortcut key.
#[derive(Deserialize)]
struct ShortcutKeyOnly {
    shortcut_key: String,
}

/// MongoDB database client.
#[derive(Clone)]
pub struct MongoStore {
    db: Option<mongodb::Database>,
}

impl MongoStore {
    /// Connect and create the unique indexes the registries rely on.
    pub async fn new(uri: &str, database: &str) -> Result<Self, AppError> {
        let client = mongodb::Client::with_uri_str(uri)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let store = Self {
            db: Some(client.database(database)),
        };
        store.ensure_indexes().await?;

        tracing::info!(database, "Connected to MongoDB");
        Ok(store)
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { db: None }
    }

    /// Helper to get the database or return an error if offline.
    fn get_db(&self) -> Result<&mongodb::Database, AppError> {
        self.db
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Unique indexes:
    /// - `users.email`
    /// - `folders (user_id, name)`: folder names unique per user
    /// - `snippets (user_id, shortcut_key_normalized)`: exact-duplicate
    ///   shortcut races caught at the store even when the conflict scan has
    ///   already passed
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        let db = self.get_db()?;
        let unique = IndexOptions::builder().unique(true).build();

        db.collection::<User>(collections::USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        db.collection::<Folder>(collections::FOLDERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "name": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        db.collection::<Snippet>(collections::SNIPPETS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "shortcut_key_normalized": 1 })
                    .options(unique)
                    .build(),
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.get_db()?
            .collection::<User>(collections::USERS)
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_user_by_id(&self, user_id: ObjectId) -> Result<Option<User>, AppError> {
        self.get_db()?
            .collection::<User>(collections::USERS)
            .find_one(doc! { "_id": user_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new user, returning the generated id.
    ///
    /// A duplicate email surfaces as `Duplicate`.
    pub async fn insert_user(&self, user: &User) -> Result<ObjectId, AppError> {
        let result = self
            .get_db()?
            .collection::<User>(collections::USERS)
            .insert_one(user)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Duplicate("User already exists".to_string())
                } else {
                    AppError::Database(e.to_string())
                }
            })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Inserted user id was not an ObjectId".to_string()))
    }

    /// Apply a partial `$set` update to a user (password, OTP state).
    ///
    /// Field validation is the caller's job; this mirrors a targeted
    /// `findOneAndUpdate` so unrelated fields are never rewritten.
    pub async fn update_user_fields(
        &self,
        user_id: ObjectId,
        fields: Document,
    ) -> Result<(), AppError> {
        let mut fields = fields;
        fields.insert("updated_at", chrono::Utc::now().to_rfc3339());

        self.get_db()?
            .collection::<User>(collections::USERS)
            .update_one(doc! { "_id": user_id }, doc! { "$set": fields })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Folder Operations ───────────────────────────────────────

    /// Insert a folder; a `(user_id, name)` collision surfaces as `Duplicate`.
    pub async fn insert_folder(&self, folder: &Folder) -> Result<ObjectId, AppError> {
        let result = self
            .get_db()?
            .collection::<Folder>(collections::FOLDERS)
            .insert_one(folder)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Duplicate("Folder name already exists".to_string())
                } else {
                    AppError::Database(e.to_string())
                }
            })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Inserted folder id was not an ObjectId".to_string()))
    }

    pub async fn find_folder(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
    ) -> Result<Option<Folder>, AppError> {
        self.get_db()?
            .collection::<Folder>(collections::FOLDERS)
            .find_one(doc! { "_id": folder_id, "user_id": user_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All folders for a user, oldest first.
    pub async fn list_folders(&self, user_id: ObjectId) -> Result<Vec<Folder>, AppError> {
        self.get_db()?
            .collection::<Folder>(collections::FOLDERS)
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Rename a folder, returning the updated document.
    ///
    /// `Ok(None)` means the folder is absent or not owned by the user.
    pub async fn rename_folder(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
        name: &str,
    ) -> Result<Option<Folder>, AppError> {
        self.get_db()?
            .collection::<Folder>(collections::FOLDERS)
            .find_one_and_update(
                doc! { "_id": folder_id, "user_id": user_id },
                doc! { "$set": { "name": name, "updated_at": chrono::Utc::now().to_rfc3339() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Duplicate("Folder name already exists".to_string())
                } else {
                    AppError::Database(e.to_string())
                }
            })
    }

    /// Delete a folder. Returns `false` if absent or not owned.
    pub async fn delete_folder(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
    ) -> Result<bool, AppError> {
        let result = self
            .get_db()?
            .collection::<Folder>(collections::FOLDERS)
            .delete_one(doc! { "_id": folder_id, "user_id": user_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.deleted_count > 0)
    }

    /// Cascade step of folder deletion: remove every snippet in the folder.
    pub async fn delete_snippets_in_folder(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
    ) -> Result<u64, AppError> {
        let result = self
            .get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .delete_many(doc! { "user_id": user_id, "folder_id": folder_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.deleted_count)
    }

    // ─── Snippet Operations ──────────────────────────────────────

    /// Insert a snippet; a normalized-shortcut collision surfaces as
    /// `Duplicate` (the check-then-insert race the conflict scan cannot
    /// close on its own).
    pub async fn insert_snippet(&self, snippet: &Snippet) -> Result<ObjectId, AppError> {
        let result = self
            .get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .insert_one(snippet)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Duplicate("Shortcut already exists for this user".to_string())
                } else {
                    AppError::Database(e.to_string())
                }
            })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Inserted snippet id was not an ObjectId".to_string()))
    }

    /// All shortcut keys for a user, in insertion order, optionally excluding
    /// one snippet (the one being updated). Input for the conflict scan; only
    /// the key field leaves the store.
    pub async fn shortcut_keys_for_user(
        &self,
        user_id: ObjectId,
        exclude_snippet: Option<ObjectId>,
    ) -> Result<Vec<String>, AppError> {
        let filter = match exclude_snippet {
            Some(id) => doc! { "user_id": user_id, "_id": { "$ne": id } },
            None => doc! { "user_id": user_id },
        };

        let keys: Vec<ShortcutKeyOnly> = self
            .get_db()?
            .collection::<ShortcutKeyOnly>(collections::SNIPPETS)
            .find(filter)
            .projection(doc! { "shortcut_key": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(keys.into_iter().map(|k| k.shortcut_key).collect())
    }

    /// One page of a folder's snippets.
    pub async fn list_snippets(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
        page: &SnippetPage,
    ) -> Result<Vec<Snippet>, AppError> {
        let direction = if page.descending { -1 } else { 1 };

        self.get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .find(doc! { "user_id": user_id, "folder_id": folder_id })
            .sort(doc! { page.sort_field.as_str(): direction })
            .skip(page.skip)
            .limit(page.limit)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_snippet(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
        snippet_id: ObjectId,
    ) -> Result<Option<Snippet>, AppError> {
        self.get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .find_one(doc! { "_id": snippet_id, "user_id": user_id, "folder_id": folder_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply a partial `$set` update to a snippet scoped to its owner and
    /// folder, returning the updated document. `Ok(None)` means absent, not
    /// owned, or not in that folder.
    pub async fn update_snippet(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
        snippet_id: ObjectId,
        fields: Document,
    ) -> Result<Option<Snippet>, AppError> {
        let mut fields = fields;
        fields.insert("updated_at", chrono::Utc::now().to_rfc3339());

        self.get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .find_one_and_update(
                doc! { "_id": snippet_id, "user_id": user_id, "folder_id": folder_id },
                doc! { "$set": fields },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Duplicate("Shortcut already exists for this user".to_string())
                } else {
                    AppError::Database(e.to_string())
                }
            })
    }

    /// Delete a snippet. Returns `false` if absent/not owned/not in folder.
    pub async fn delete_snippet(
        &self,
        user_id: ObjectId,
        folder_id: ObjectId,
        snippet_id: ObjectId,
    ) -> Result<bool, AppError> {
        let result = self
            .get_db()?
            .collection::<Snippet>(collections::SNIPPETS)
            .delete_one(doc! { "_id": snippet_id, "user_id": user_id, "folder_id": folder_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.deleted_count > 0)
    }
}

/// Whether a Mongo error is a unique index violation.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => {
            write_err.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_err) => command_err.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
