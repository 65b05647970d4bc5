//! Defines routes for folder, file and upload operations.
//!
//! ## Structure
//! - **Folder endpoints**
//!   - `POST   /folders` — create folder
//!   - `GET    /folders?parentId=` — list child folders (root when omitted)
//!   - `GET    /folders/{id}` — fetch one folder
//!   - `GET    /folders/{id}/contents` — child folders + visible files (`id` may be `root`)
//!   - `PATCH  /folders/{id}` — rename
//!   - `DELETE /folders/{id}` — cascade delete
//!   - `GET    /search?q=` — search folder and file names
//!
//! - **File endpoints**
//!   - `POST   /files/upload-request` — start a multipart upload
//!   - `POST   /files/complete` — seal a multipart upload
//!   - `GET    /files?folderId=` — files visible to the caller
//!   - `GET    /files/public?folderId=` — public files
//!   - `PATCH  /files/{id}` — rename
//!   - `DELETE /files/{id}` — delete object + metadata
//!   - `GET    /files/{id}/download` — signed download URL
//!
//! The caller is identified by the `x-owner-id` header.

use crate::{
    handlers::{
        file_handlers::{
            complete_upload, create_upload_request, delete_file, download_url, list_files,
            list_public_files, rename_file,
        },
        folder_handlers::{
            create_folder, delete_folder, folder_contents, get_folder, list_folders,
            rename_folder, search,
        },
        health_handlers::{healthz, readyz},
    },
    services::drive_service::DriveService,
};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Build and return the router for all drive routes.
///
/// The router carries shared state (`DriveService`) to all handlers.
pub fn routes() -> Router<DriveService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Folder routes
        .route("/folders", post(create_folder).get(list_folders))
        .route(
            "/folders/{id}",
            get(get_folder).patch(rename_folder).delete(delete_folder),
        )
        .route("/folders/{id}/contents", get(folder_contents))
        .route("/search", get(search))
        // File routes
        .route("/files", get(list_files))
        .route("/files/public", get(list_public_files))
        .route("/files/upload-request", post(create_upload_request))
        .route("/files/complete", post(complete_upload))
        .route("/files/{id}", patch(rename_file).delete(delete_file))
        .route("/files/{id}/download", get(download_url))
}
