//! Port to the S3-compatible object store.
//!
//! The core never moves object bytes. It only opens and seals multipart
//! sessions, deletes objects, and asks for signed URLs that clients use to
//! PUT parts and GET whole objects directly against the store.

use crate::{config::S3Settings, models::upload::PartReceipt};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart},
};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("object store returned no upload id")]
    MissingUploadId,
    #[error("part number {0} is out of range")]
    PartNumberOutOfRange(u32),
    #[error("invalid presigning configuration: {0}")]
    Presign(String),
    #[error("{0}")]
    Remote(String),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Operations the metadata engine needs from the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start a multipart session for `key`. `None` means the store accepted
    /// the request but handed back no session id.
    async fn open_multipart_session(
        &self,
        key: &str,
        content_type: &str,
    ) -> ObjectStoreResult<Option<String>>;

    async fn sign_part_upload_url(
        &self,
        key: &str,
        session_id: &str,
        part_number: u32,
        ttl: Duration,
    ) -> ObjectStoreResult<String>;

    /// Seal a multipart session. `parts` must already be in ascending order.
    async fn complete_multipart_session(
        &self,
        key: &str,
        session_id: &str,
        parts: &[PartReceipt],
    ) -> ObjectStoreResult<()>;

    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()>;

    async fn sign_get_url(
        &self,
        key: &str,
        response_content_type: Option<&str>,
        response_disposition: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<String>;
}

/// Run a remote call under the shared timeout bound.
pub async fn bounded<T, F>(limit: Duration, call: F) -> ObjectStoreResult<T>
where
    F: Future<Output = ObjectStoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ObjectStoreError::Timeout(limit)),
    }
}

/// `ObjectStore` backed by an S3-compatible bucket through `aws-sdk-s3`.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from static settings.
    ///
    /// A custom endpoint (MinIO, R2, ...) switches to path-style addressing.
    /// Without explicit keys the default AWS credential chain applies.
    pub async fn from_settings(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "drive-store",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), settings.bucket.clone())
    }

    fn presigning(ttl: Duration) -> ObjectStoreResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|err| ObjectStoreError::Presign(err.to_string()))
    }
}

fn wire_part_number(part_number: u32) -> ObjectStoreResult<i32> {
    i32::try_from(part_number).map_err(|_| ObjectStoreError::PartNumberOutOfRange(part_number))
}

fn remote<E>(err: E) -> ObjectStoreError
where
    E: std::error::Error,
{
    ObjectStoreError::Remote(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn open_multipart_session(
        &self,
        key: &str,
        content_type: &str,
    ) -> ObjectStoreResult<Option<String>> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(remote)?;
        debug!(key, upload_id = ?output.upload_id(), "opened multipart session");
        Ok(output.upload_id().map(str::to_string))
    }

    async fn sign_part_upload_url(
        &self,
        key: &str,
        session_id: &str,
        part_number: u32,
        ttl: Duration,
    ) -> ObjectStoreResult<String> {
        let request = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(session_id)
            .part_number(wire_part_number(part_number)?)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(remote)?;
        Ok(request.uri().to_string())
    }

    async fn complete_multipart_session(
        &self,
        key: &str,
        session_id: &str,
        parts: &[PartReceipt],
    ) -> ObjectStoreResult<()> {
        let completed = parts
            .iter()
            .map(|part| {
                Ok(CompletedPart::builder()
                    .part_number(wire_part_number(part.part_number)?)
                    .e_tag(&part.e_tag)
                    .build())
            })
            .collect::<ObjectStoreResult<Vec<_>>>()?;

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(session_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(remote)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(remote)?;
        Ok(())
    }

    async fn sign_get_url(
        &self,
        key: &str,
        response_content_type: Option<&str>,
        response_disposition: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(response_disposition)
            .set_response_content_type(response_content_type.map(str::to_string))
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(remote)?;
        Ok(request.uri().to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_reports_timeout() {
        let limit = Duration::from_millis(10);
        let result: ObjectStoreResult<()> = bounded(limit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ObjectStoreError::Timeout(d)) if d == limit));
    }

    #[test]
    fn part_numbers_never_wrap_on_the_wire() {
        assert_eq!(wire_part_number(10_000).unwrap(), 10_000);
        assert!(matches!(
            wire_part_number(u32::MAX),
            Err(ObjectStoreError::PartNumberOutOfRange(u32::MAX))
        ));
    }

    #[tokio::test]
    async fn bounded_passes_through_results() {
        let ok = bounded(Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);

        let err: ObjectStoreResult<()> = bounded(Duration::from_secs(1), async {
            Err(ObjectStoreError::MissingUploadId)
        })
        .await;
        assert!(matches!(err, Err(ObjectStoreError::MissingUploadId)));
    }
}
