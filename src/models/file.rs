//! Represents file metadata. Bytes live in the object store under
//! `storage_key`; this row exists from upload intent onwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Largest object accepted at upload time: 2 GiB.
pub const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Metadata for a single stored file.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,

    pub owner_id: Uuid,

    /// Containing folder, `None` for files at the owner's root.
    pub folder_id: Option<Uuid>,

    /// Display name supplied by the uploader; renames only touch this.
    pub original_name: String,

    pub mime: String,

    /// Declared size in bytes.
    #[sqlx(try_from = "i64")]
    pub size: u64,

    /// Object-store key, derived from owner, id and version.
    pub storage_key: String,

    /// Client-supplied checksum (md5/sha256), if any.
    pub checksum: Option<String>,

    pub version: i32,

    /// Public files may be read and downloaded by anyone.
    pub is_public: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Object-store key for a given file version.
///
/// Keys embed the version so a new version never overwrites the bytes of
/// an older one.
pub fn storage_key(owner_id: Uuid, file_id: Uuid, version: i32) -> String {
    format!("u/{}/file/{}/v/{}", owner_id, file_id, version)
}
