//! Upload intents, multipart plans and completion receipts.
//!
//! None of these are persisted: the remote store owns the multipart state
//! and the file row is the only local trace of an upload.

use crate::models::folder::FolderRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed part size for multipart uploads: 10 MiB.
pub const PART_SIZE: u64 = 10 * 1024 * 1024;

/// Highest part number S3 accepts in a multipart upload.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Lifetime of every signed URL issued by the service.
pub const SIGNED_URL_TTL_SECS: u64 = 900;

/// Declared intent to upload a file.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadIntent {
    /// Target folder; omitted or `root` uploads to the top level.
    #[serde(default)]
    pub folder_id: Option<FolderRef>,
    pub original_name: String,
    pub mime: String,
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// A signed URL for uploading one part.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

/// Multipart plan returned to the client.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub file_id: Uuid,
    pub upload_id: String,
    pub storage_key: String,
    pub part_size: u64,
    pub parts: Vec<PartUrl>,
}

/// ETag reported by the client for one uploaded part.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartReceipt {
    pub part_number: u32,
    #[serde(rename = "eTag", alias = "ETag")]
    pub e_tag: String,
}

/// Body of a completion request.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub file_id: Uuid,
    pub upload_id: String,
    #[serde(default)]
    pub parts: Vec<PartReceipt>,
}

/// Number of parts needed for `size` bytes; never less than one.
pub fn part_count(size: u64, part_size: u64) -> u32 {
    size.div_ceil(part_size).max(1) as u32
}
