//! FileStore: file metadata rows in SQLite, independent of object bytes.

use crate::{
    models::file::FileRecord,
    services::{DriveError, DriveResult, fold_name},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const FILE_COLUMNS: &str = "id, owner_id, folder_id, original_name, mime, size, \
     storage_key, checksum, version, is_public, created_at, updated_at";

#[derive(Clone)]
pub struct FileStore {
    pub db: Arc<SqlitePool>,
}

impl FileStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new file row.
    ///
    /// A folder that vanished between lookup and insert trips the foreign
    /// key and is reported as `FolderNotFound`.
    pub async fn insert(&self, file: &FileRecord) -> DriveResult<()> {
        let result = sqlx::query(
            "INSERT INTO files (
                id, owner_id, folder_id, original_name, name_folded, mime, size,
                storage_key, checksum, version, is_public, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file.id)
        .bind(file.owner_id)
        .bind(file.folder_id)
        .bind(&file.original_name)
        .bind(fold_name(&file.original_name))
        .bind(&file.mime)
        .bind(file.size as i64)
        .bind(&file.storage_key)
        .bind(file.checksum.as_deref())
        .bind(file.version)
        .bind(file.is_public)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => Err(DriveError::FolderNotFound),
            Err(err) => Err(DriveError::Sqlx(err)),
        }
    }

    pub async fn find(&self, id: Uuid) -> DriveResult<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(file)
    }

    /// Fetch a file row or fail with `FileNotFound`.
    pub async fn get(&self, id: Uuid) -> DriveResult<FileRecord> {
        self.find(id).await?.ok_or(DriveError::FileNotFound)
    }

    pub async fn rename(&self, id: Uuid, new_name: &str) -> DriveResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "UPDATE files SET original_name = ?, name_folded = ?, updated_at = ? WHERE id = ?
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(new_name)
        .bind(fold_name(new_name))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(DriveError::FileNotFound)
    }

    pub async fn delete(&self, id: Uuid) -> DriveResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DriveError::FileNotFound);
        }
        Ok(())
    }

    /// Files in `folder_id` (root when `None`) that `viewer` owns or that
    /// are public, most recently updated first.
    pub async fn list_visible(
        &self,
        viewer: Uuid,
        folder_id: Option<Uuid>,
    ) -> DriveResult<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE (owner_id = ? OR is_public = 1) AND folder_id IS ?
             ORDER BY updated_at DESC"
        ))
        .bind(viewer)
        .bind(folder_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(files)
    }

    /// Public files in `folder_id` (root when `None`), newest first.
    pub async fn list_public(&self, folder_id: Option<Uuid>) -> DriveResult<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE is_public = 1 AND folder_id IS ?
             ORDER BY updated_at DESC"
        ))
        .bind(folder_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(files)
    }
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_foreign_key_violation()
                || db_err.message().to_ascii_lowercase().contains("foreign key")
        }
        _ => false,
    }
}
