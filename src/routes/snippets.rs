// SPDX-License-Identifier: MIT

//! Snippet registry routes.
//!
//! Every write that touches a shortcut key runs the conflict scan under the
//! user's advisory write lock, so two in-flight writes for one user cannot
//! both pass the scan with prefix-conflicting keys.

use crate::db::SnippetPage;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Snippet;
use crate::routes::parse_object_id;
use crate::services::conflict::{find_conflict, normalize_key};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/folders/{folderId}/snippets",
            get(list_snippets).post(create_snippet),
        )
        .route(
            "/api/folders/{folderId}/snippets/{snippetId}",
            get(get_snippet),
        )
        .route(
            "/api/folders/{folderId}/snippet/{snippetId}",
            put(update_snippet).delete(delete_snippet),
        )
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSnippetRequest {
    shortcut_key: String,
    content: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateSnippetRequest {
    shortcut_key: Option<String>,
    content: Option<String>,
    description: Option<String>,
    target_folder_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    limit: Option<i64>,
    skip: Option<u64>,
    sort_by: Option<String>,
    order_by: Option<String>,
    /// Comma-separated response field projection
    fields: Option<String>,
}

/// Snippet as returned to the client.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetResponse {
    pub id: String,
    pub folder_id: String,
    pub shortcut_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Snippet> for SnippetResponse {
    fn from(snippet: Snippet) -> Self {
        Self {
            id: snippet.id.map(|id| id.to_hex()).unwrap_or_default(),
            folder_id: snippet.folder_id.to_hex(),
            shortcut_key: snippet.shortcut_key,
            description: snippet.description,
            content: snippet.content,
            created_at: snippet.created_at,
            updated_at: snippet.updated_at,
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct UpdateResponse {
    message: String,
    snippet: SnippetResponse,
}

// ─── Query Parameter Handling ────────────────────────────────

/// API field names accepted for `sortBy` and `fields`, with their stored
/// counterparts.
const FIELD_MAP: &[(&str, &str)] = &[
    ("shortcutKey", "shortcut_key"),
    ("content", "content"),
    ("description", "description"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

fn stored_field(api_name: &str) -> Option<&'static str> {
    FIELD_MAP
        .iter()
        .find(|(api, _)| *api == api_name)
        .map(|(_, stored)| *stored)
}

/// Validate pagination/sort parameters, applying the documented defaults:
/// limit 10, skip 0, sort by shortcut key ascending.
fn resolve_page(query: &ListQuery) -> Result<SnippetPage> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit < 1 || limit > MAX_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let sort_field = match query.sort_by.as_deref() {
        None => "shortcut_key",
        Some(api_name) => stored_field(api_name)
            .ok_or_else(|| AppError::Validation(format!("Unknown sort field: {}", api_name)))?,
    };

    let descending = match query.order_by.as_deref() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "orderBy must be 'asc' or 'desc', got '{}'",
                other
            )))
        }
    };

    Ok(SnippetPage {
        limit,
        skip: query.skip.unwrap_or(0),
        sort_field: sort_field.to_string(),
        descending,
    })
}

/// Parse the `fields` projection list; `None` means return everything.
fn parse_fields(raw: Option<&str>) -> Result<Option<Vec<String>>> {
    let Some(raw) = raw else { return Ok(None) };

    let mut fields = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        if stored_field(name).is_none() {
            return Err(AppError::Validation(format!(
                "Unknown projection field: {}",
                name
            )));
        }
        fields.push(name.to_string());
    }

    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(fields))
}

/// Reduce a serialized snippet to the requested fields (id always kept).
fn project_response(snippet: SnippetResponse, fields: &[String]) -> serde_json::Value {
    let mut value = match serde_json::to_value(snippet) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return serde_json::Value::Null,
    };
    value.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
    serde_json::Value::Object(value)
}

// ─── Handlers ────────────────────────────────────────────────

/// Resolve a folder path param to a folder owned by the caller.
async fn require_owned_folder(
    state: &AppState,
    user_id: ObjectId,
    raw_folder_id: &str,
) -> Result<ObjectId> {
    let folder_id = parse_object_id(raw_folder_id, "Folder")?;
    state
        .db
        .find_folder(user_id, folder_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Folder not found".to_string()))?;
    Ok(folder_id)
}

/// Acquire the caller's advisory write lock.
async fn user_write_lock(state: &AppState, user_id: ObjectId) -> Arc<Mutex<()>> {
    state
        .write_locks
        .entry(user_id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Create a snippet under a folder.
async fn create_snippet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(folder_id): Path<String>,
    Json(body): Json<CreateSnippetRequest>,
) -> Result<(StatusCode, Json<SnippetResponse>)> {
    let folder_id = require_owned_folder(&state, user.user_id, &folder_id).await?;

    let shortcut_key = body.shortcut_key.trim();
    if shortcut_key.is_empty() {
        return Err(AppError::Validation("Shortcut key is required".to_string()));
    }

    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Content is required".to_string()));
    }

    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    if state.config.require_description && description.is_none() {
        return Err(AppError::Validation("Description is required".to_string()));
    }

    // Scan-then-insert must be serialized per user; see module docs
    let lock = user_write_lock(&state, user.user_id).await;
    let _guard = lock.lock().await;

    let existing = state.db.shortcut_keys_for_user(user.user_id, None).await?;
    if let Some(conflicting) = find_conflict(shortcut_key, existing.iter().map(String::as_str)) {
        return Err(AppError::Conflict(format!(
            "Conflicting shortcut with {}. Please choose a unique shortcut.",
            conflicting
        )));
    }

    let mut snippet = Snippet::new(
        user.user_id,
        folder_id,
        shortcut_key.to_string(),
        content.to_string(),
        description,
    );
    let id = state.db.insert_snippet(&snippet).await?;
    snippet.id = Some(id);

    tracing::debug!(user_id = %user.user_id, snippet_id = %id, "Snippet created");
    Ok((StatusCode::CREATED, Json(snippet.into())))
}

/// List one page of a folder's snippets.
async fn list_snippets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(folder_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = resolve_page(&query)?;
    let fields = parse_fields(query.fields.as_deref())?;
    let folder_id = require_owned_folder(&state, user.user_id, &folder_id).await?;

    let snippets = state
        .db
        .list_snippets(user.user_id, folder_id, &page)
        .await?;

    let items: Vec<serde_json::Value> = snippets
        .into_iter()
        .map(SnippetResponse::from)
        .map(|snippet| match &fields {
            Some(fields) => project_response(snippet, fields),
            None => serde_json::to_value(snippet).unwrap_or(serde_json::Value::Null),
        })
        .collect();

    Ok(Json(serde_json::Value::Array(items)))
}

/// Fetch a single snippet by id.
async fn get_snippet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((folder_id, snippet_id)): Path<(String, String)>,
) -> Result<Json<SnippetResponse>> {
    let folder_id = require_owned_folder(&state, user.user_id, &folder_id).await?;
    let snippet_id = parse_object_id(&snippet_id, "Snippet")?;

    let snippet = state
        .db
        .find_snippet(user.user_id, folder_id, snippet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Snippet not found".to_string()))?;

    Ok(Json(snippet.into()))
}

/// Update fields that actually change the snippet.
///
/// Values equal to the stored ones are dropped: resending the current state
/// is not an update. The comparison for the shortcut key is on the raw
/// trimmed text, so a case-only rename ("gm" to "GM") still counts as a
/// change.
fn changed_fields(current: &Snippet, body: &UpdateSnippetRequest) -> Result<Document> {
    let mut fields = Document::new();

    if let Some(content) = body.content.as_deref() {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Content is required".to_string()));
        }
        if content != current.content {
            fields.insert("content", content);
        }
    }

    if let Some(description) = body.description.as_deref() {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::Validation("Description is required".to_string()));
        }
        if current.description.as_deref() != Some(description) {
            fields.insert("description", description);
        }
    }

    if let Some(shortcut_key) = body.shortcut_key.as_deref() {
        let shortcut_key = shortcut_key.trim();
        if shortcut_key.is_empty() {
            return Err(AppError::Validation("Shortcut key is required".to_string()));
        }
        if shortcut_key != current.shortcut_key {
            fields.insert("shortcut_key", shortcut_key);
            fields.insert("shortcut_key_normalized", normalize_key(shortcut_key));
        }
    }

    Ok(fields)
}

/// Apply a partial update to a snippet.
async fn update_snippet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((folder_id, snippet_id)): Path<(String, String)>,
    Json(body): Json<UpdateSnippetRequest>,
) -> Result<Json<UpdateResponse>> {
    if body.shortcut_key.is_none()
        && body.content.is_none()
        && body.description.is_none()
        && body.target_folder_id.is_none()
    {
        return Err(AppError::Validation("No valid fields supplied".to_string()));
    }

    let folder_id = require_owned_folder(&state, user.user_id, &folder_id).await?;
    let snippet_id = parse_object_id(&snippet_id, "Snippet")?;

    let current = state
        .db
        .find_snippet(user.user_id, folder_id, snippet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Snippet not found".to_string()))?;

    let mut fields = changed_fields(&current, &body)?;

    if let Some(target) = body.target_folder_id.as_deref() {
        let target_id = parse_object_id(target, "Target folder")?;
        if target_id != current.folder_id {
            state
                .db
                .find_folder(user.user_id, target_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Target folder not found".to_string()))?;
            fields.insert("folder_id", target_id);
        }
    }

    // Every provided value matched the stored one
    if fields.is_empty() {
        return Err(AppError::Validation("No valid fields supplied".to_string()));
    }

    // Hold the write lock across the conflict scan and the update when the
    // shortcut key changes
    let mut _guard = None;
    if let Ok(shortcut_key) = fields.get_str("shortcut_key") {
        let normalized = normalize_key(shortcut_key);
        if normalized != current.shortcut_key_normalized {
            let lock = user_write_lock(&state, user.user_id).await;
            _guard = Some(lock.lock_owned().await);

            // Exclude the snippet's own key: renaming "gm" to "GM" must not
            // conflict with itself
            let existing = state
                .db
                .shortcut_keys_for_user(user.user_id, Some(snippet_id))
                .await?;
            if let Some(conflicting) =
                find_conflict(shortcut_key, existing.iter().map(String::as_str))
            {
                return Err(AppError::Conflict(format!(
                    "Conflicting shortcut with {}. Please choose a unique shortcut.",
                    conflicting
                )));
            }
        }
    }

    let snippet = state
        .db
        .update_snippet(user.user_id, folder_id, snippet_id, fields)
        .await?
        .ok_or_else(|| AppError::NotFound("Snippet not found".to_string()))?;

    Ok(Json(UpdateResponse {
        message: "Snippet updated".to_string(),
        snippet: snippet.into(),
    }))
}

/// Delete a snippet.
async fn delete_snippet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((folder_id, snippet_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    let folder_id = require_owned_folder(&state, user.user_id, &folder_id).await?;
    let snippet_id = parse_object_id(&snippet_id, "Snippet")?;

    let deleted = state
        .db
        .delete_snippet(user.user_id, folder_id, snippet_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Snippet not found".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Snippet deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_page_defaults() {
        let page = resolve_page(&ListQuery::default()).unwrap();
        assert_eq!(page.limit, 10);
        assert_eq!(page.skip, 0);
        assert_eq!(page.sort_field, "shortcut_key");
        assert!(!page.descending);
    }

    #[test]
    fn test_resolve_page_custom() {
        let query = ListQuery {
            limit: Some(5),
            skip: Some(10),
            sort_by: Some("content".to_string()),
            order_by: Some("desc".to_string()),
            fields: None,
        };

        let page = resolve_page(&query).unwrap();
        assert_eq!(page.limit, 5);
        assert_eq!(page.skip, 10);
        assert_eq!(page.sort_field, "content");
        assert!(page.descending);
    }

    #[test]
    fn test_resolve_page_rejects_unknown_sort_field() {
        let query = ListQuery {
            sort_by: Some("passwordHash".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_page(&query),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_page_rejects_bad_order() {
        let query = ListQuery {
            order_by: Some("down".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_page(&query),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_page_rejects_zero_limit() {
        let query = ListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve_page(&query),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(parse_fields(None).unwrap(), None);
        assert_eq!(
            parse_fields(Some("shortcutKey, content")).unwrap(),
            Some(vec!["shortcutKey".to_string(), "content".to_string()])
        );
        assert!(matches!(
            parse_fields(Some("secret")),
            Err(AppError::Validation(_))
        ));
    }

    fn stored_snippet() -> Snippet {
        Snippet::new(
            ObjectId::new(),
            ObjectId::new(),
            "gm".to_string(),
            "good morning".to_string(),
            Some("greeting".to_string()),
        )
    }

    #[test]
    fn test_changed_fields_drops_values_equal_to_stored() {
        // Resending the snippet's current state must not count as an update
        let current = stored_snippet();
        let body = UpdateSnippetRequest {
            shortcut_key: Some("gm".to_string()),
            content: Some("good morning".to_string()),
            description: Some("greeting".to_string()),
            target_folder_id: None,
        };

        let fields = changed_fields(&current, &body).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_changed_fields_keeps_actual_changes() {
        let current = stored_snippet();
        let body = UpdateSnippetRequest {
            content: Some("good evening".to_string()),
            ..Default::default()
        };

        let fields = changed_fields(&current, &body).unwrap();
        assert_eq!(fields.get_str("content").unwrap(), "good evening");
        assert!(fields.get_str("shortcut_key").is_err());
    }

    #[test]
    fn test_changed_fields_keeps_case_only_rename() {
        // "gm" to "GM" is a real change even though the normalized form is
        // identical; the stored key must end up as typed
        let current = stored_snippet();
        let body = UpdateSnippetRequest {
            shortcut_key: Some("GM".to_string()),
            ..Default::default()
        };

        let fields = changed_fields(&current, &body).unwrap();
        assert_eq!(fields.get_str("shortcut_key").unwrap(), "GM");
        assert_eq!(fields.get_str("shortcut_key_normalized").unwrap(), "gm");
    }

    #[test]
    fn test_changed_fields_rejects_blank_values() {
        let current = stored_snippet();
        let body = UpdateSnippetRequest {
            content: Some("   ".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            changed_fields(&current, &body),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_project_response_keeps_id_and_requested_fields() {
        let snippet = SnippetResponse {
            id: "abc".to_string(),
            folder_id: "def".to_string(),
            shortcut_key: "gm".to_string(),
            description: None,
            content: "good morning".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let projected = project_response(snippet, &["shortcutKey".to_string()]);
        let object = projected.as_object().unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["id"], "abc");
        assert_eq!(object["shortcutKey"], "gm");
    }
}
