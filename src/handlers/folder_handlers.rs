//! HTTP handlers for the folder tree and search.

use crate::{
    errors::AppError,
    handlers::actor::Actor,
    models::folder::FolderRef,
    services::drive_service::DriveService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderReq {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<FolderRef>,
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFoldersQuery {
    pub parent_id: Option<FolderRef>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// POST `/folders`
pub async fn create_folder(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Json(req): Json<CreateFolderReq>,
) -> Result<impl IntoResponse, AppError> {
    let parent = req.parent_id.unwrap_or(FolderRef::Root);
    let folder = service.create_folder(actor, &req.name, parent).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// GET `/folders?parentId=` — children of a folder, or of the root.
pub async fn list_folders(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Query(q): Query<ListFoldersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let parent = q.parent_id.unwrap_or(FolderRef::Root);
    Ok(Json(service.list_folders(actor, parent).await?))
}

/// GET `/folders/{id}`
pub async fn get_folder(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.get_folder(actor, id).await?))
}

/// GET `/folders/{id}/contents` — `id` may be `root`.
pub async fn folder_contents(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(folder): Path<FolderRef>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.folder_contents(actor, folder).await?))
}

/// PATCH `/folders/{id}`
pub async fn rename_folder(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameReq>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.rename_folder(actor, id, &req.name).await?))
}

/// DELETE `/folders/{id}` — removes the whole subtree.
pub async fn delete_folder(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let removed = service.remove_folder(actor, id).await?;
    Ok(Json(json!({
        "folders": removed.folder_ids.len(),
        "files": removed.storage_keys.len(),
        "unreclaimed": removed.unreclaimed_keys,
    })))
}

/// GET `/search?q=`
pub async fn search(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.search(actor, &q.q).await?))
}
