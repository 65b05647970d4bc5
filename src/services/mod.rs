//! Metadata engine and upload orchestration.
//!
//! `DriveService` is the entry point used by the HTTP layer; the stores and
//! the object-store port underneath it are usable on their own.

pub mod access;
pub mod download;
pub mod drive_service;
pub mod file_store;
pub mod folder_store;
pub mod object_store;
pub mod upload;

use crate::services::object_store::ObjectStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    /// Missing, or not visible to the caller. The two are never told apart.
    #[error("not found")]
    NotFound,
    #[error("parent folder not found")]
    ParentNotFound,
    #[error("folder not found")]
    FolderNotFound,
    #[error("file not found")]
    FileNotFound,
    #[error("a folder named `{0}` already exists at this level")]
    DuplicateName(String),
    #[error("invalid name: {0}")]
    InvalidName(&'static str),
    #[error("invalid mime type `{0}`")]
    InvalidMime(String),
    #[error("checksum must be at most {0} characters")]
    InvalidChecksum(usize),
    #[error("invalid file size")]
    InvalidSize,
    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },
    #[error("search term is required")]
    InvalidSearchTerm,
    #[error("part numbers must be between 1 and 10000")]
    InvalidPartNumber,
    #[error("no parts supplied")]
    NoPartsSupplied,
    #[error("object store bucket is not configured")]
    BucketNotConfigured,
    #[error("failed to start upload: {0}")]
    UploadInitFailed(#[source] ObjectStoreError),
    #[error("failed to complete upload: {0}")]
    UploadFinalizeFailed(#[source] ObjectStoreError),
    #[error("failed to delete object: {0}")]
    ObjectDeleteFailed(#[source] ObjectStoreError),
    #[error("failed to sign download url: {0}")]
    DownloadSignFailed(#[source] ObjectStoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DriveResult<T> = Result<T, DriveError>;

const MAX_NAME_LEN: usize = 255;
const MAX_CHECKSUM_LEN: usize = 255;

/// Validate a folder or file display name. Names are stored exactly as sent.
pub(crate) fn ensure_name_valid(name: &str) -> DriveResult<()> {
    if name.trim().is_empty() {
        return Err(DriveError::InvalidName("must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DriveError::InvalidName("must be at most 255 characters"));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(DriveError::InvalidName("must not contain control characters"));
    }
    Ok(())
}

/// Search key for a display name. SQLite `LIKE` only folds ASCII, so names
/// are stored and matched in their Unicode lowercase form.
pub(crate) fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err.message().to_ascii_lowercase().contains("unique")
        }
        _ => false,
    }
}

pub(crate) fn ensure_mime_valid(mime: &str) -> DriveResult<()> {
    match mime.parse::<mime::Mime>() {
        Ok(_) => Ok(()),
        Err(_) => Err(DriveError::InvalidMime(mime.to_string())),
    }
}

pub(crate) fn ensure_checksum_valid(checksum: Option<&str>) -> DriveResult<()> {
    match checksum {
        Some(value) if value.chars().count() > MAX_CHECKSUM_LEN => {
            Err(DriveError::InvalidChecksum(MAX_CHECKSUM_LEN))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for service tests.

    use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
    use std::sync::Arc;

    /// Fresh in-memory database with the schema applied.
    ///
    /// A single connection keeps every query on the same in-memory database.
    pub async fn memory_db() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(pool)
    }
}
