// SPDX-License-Identifier: MIT

//! Folder registry routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Folder;
use crate::routes::parse_object_id;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/folders", post(create_folder).get(list_folders))
        .route(
            "/api/folders/{id}",
            put(rename_folder).delete(delete_folder),
        )
}

#[derive(Deserialize)]
struct FolderRequest {
    name: String,
}

/// Folder as returned to the client.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: folder.name,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Create a folder. The `(user_id, name)` unique index rejects duplicates.
async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<FolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Folder name is required".to_string()));
    }

    let mut folder = Folder::new(name.to_string(), user.user_id);
    let id = state.db.insert_folder(&folder).await?;
    folder.id = Some(id);

    tracing::debug!(user_id = %user.user_id, folder_id = %id, "Folder created");
    Ok((StatusCode::CREATED, Json(folder.into())))
}

/// List the user's folders, oldest first.
async fn list_folders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<FolderResponse>>> {
    let folders = state.db.list_folders(user.user_id).await?;
    Ok(Json(folders.into_iter().map(Into::into).collect()))
}

/// Rename a folder.
async fn rename_folder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<FolderRequest>,
) -> Result<Json<FolderResponse>> {
    let folder_id = parse_object_id(&id, "Folder")?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Folder name is required".to_string()));
    }

    let folder = state
        .db
        .rename_folder(user.user_id, folder_id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("Folder not found".to_string()))?;

    Ok(Json(folder.into()))
}

/// Delete a folder and, by policy, every snippet inside it.
///
/// Leaving orphaned snippets behind would make them unreachable through any
/// folder listing while still occupying their shortcut keys, so deletion
/// cascades.
async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let folder_id = parse_object_id(&id, "Folder")?;

    let deleted = state.db.delete_folder(user.user_id, folder_id).await?;
    if !deleted {
        return Err(AppError::NotFound("Folder not found".to_string()));
    }

    let snippets_removed = state
        .db
        .delete_snippets_in_folder(user.user_id, folder_id)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        folder_id = %folder_id,
        snippets_removed,
        "Folder deleted"
    );

    Ok(Json(MessageResponse {
        message: "Folder and its snippets deleted".to_string(),
    }))
}
