//! HTTP handlers for uploads, downloads and file metadata.

use crate::{
    errors::AppError,
    handlers::{
        actor::{Actor, MaybeActor},
        folder_handlers::RenameReq,
    },
    models::{
        folder::FolderRef,
        upload::{CompletionRequest, UploadIntent},
    },
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
pub struct ListFilesQuery {
    pub folder_id: Option<FolderRef>,
}

/// POST `/files/upload-request` — register a file and return its part plan.
pub async fn create_upload_request(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Json(intent): Json<UploadIntent>,
) -> Result<impl IntoResponse, AppError> {
    let session = service.create_upload_request(actor, intent).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST `/files/complete`
pub async fn complete_upload(
    State(service): State<DriveService>,
    Json(req): Json<CompletionRequest>,
) -> Result<impl IntoResponse, AppError> {
    service
        .complete_upload(req.file_id, &req.upload_id, req.parts)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET `/files?folderId=`
pub async fn list_files(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Query(q): Query<ListFilesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let folder = q.folder_id.unwrap_or(FolderRef::Root);
    Ok(Json(service.list_files(actor, folder).await?))
}

/// GET `/files/public?folderId=` — no caller identity needed.
pub async fn list_public_files(
    State(service): State<DriveService>,
    Query(q): Query<ListFilesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let folder = q.folder_id.unwrap_or(FolderRef::Root);
    Ok(Json(service.list_public_files(folder).await?))
}

/// PATCH `/files/{id}`
pub async fn rename_file(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameReq>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.rename_file(actor, id, &req.name).await?))
}

/// DELETE `/files/{id}` — removes the stored object and the row.
pub async fn delete_file(
    State(service): State<DriveService>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_file(actor, id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET `/files/{id}/download` — anonymous callers may fetch public files.
pub async fn download_url(
    State(service): State<DriveService>,
    MaybeActor(actor): MaybeActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.get_download_url(id, actor).await?))
}
