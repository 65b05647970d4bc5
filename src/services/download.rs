//! Signed download links.

use crate::{
    models::upload::SIGNED_URL_TTL_SECS,
    services::{
        DriveError, DriveResult, access::can_read, drive_service::DriveService,
        object_store::bounded,
    },
};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub url: String,
    pub file_name: String,
    pub mime: String,
    pub size: u64,
}

/// `Content-Disposition` value carrying the name twice: an ASCII fallback
/// in `filename` and the exact UTF-8 name in `filename*` (RFC 6266).
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            ' '..='~' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

impl DriveService {
    /// Issue a time-boxed GET URL for a file.
    ///
    /// Private files are only served to their owner; everyone else, and
    /// anonymous requesters, get `NotFound`.
    pub async fn get_download_url(
        &self,
        file_id: Uuid,
        requester: Option<Uuid>,
    ) -> DriveResult<DownloadLink> {
        let store = self.object_store()?;

        let file = match self.files.find(file_id).await? {
            Some(file) if can_read(requester, &file) => file,
            _ => return Err(DriveError::NotFound),
        };

        let disposition = content_disposition(&file.original_name);
        let content_type = Some(file.mime.as_str()).filter(|m| !m.is_empty());
        let url = bounded(
            self.remote_timeout,
            store.sign_get_url(
                &file.storage_key,
                content_type,
                &disposition,
                Duration::from_secs(SIGNED_URL_TTL_SECS),
            ),
        )
        .await
        .map_err(DriveError::DownloadSignFailed)?;

        debug!(file_id = %file_id, public = file.is_public, "issued download url");

        Ok(DownloadLink {
            url,
            file_name: file.original_name,
            mime: file.mime,
            size: file.size,
        })
    }
}
