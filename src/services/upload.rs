//! Multipart upload orchestration.
//!
//! `create_upload_request` turns an upload intent into a part plan: a file
//! row, a remote multipart session, and one signed PUT URL per 10 MiB part.
//! `complete_upload` seals the session from the client's part ETags.
//!
//! Remote failures are surfaced, never retried: retrying a half-open
//! multipart session safely means starting over with a fresh storage key,
//! which only the caller can decide to do.

use crate::{
    models::{
        file::{FileRecord, MAX_FILE_BYTES, storage_key},
        folder::FolderRef,
        upload::{
            MAX_PART_NUMBER, PART_SIZE, PartReceipt, PartUrl, SIGNED_URL_TTL_SECS, UploadIntent,
            UploadSession, part_count,
        },
    },
    services::{
        DriveError, DriveResult,
        access::owns_folder,
        drive_service::DriveService,
        ensure_checksum_valid, ensure_mime_valid, ensure_name_valid,
        object_store::{ObjectStoreError, bounded},
    },
};
use chrono::Utc;
use futures::future::try_join_all;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

impl DriveService {
    /// Register a pending file and hand back its multipart upload plan.
    ///
    /// The file row is written before the remote session is opened, so a
    /// client that never completes leaves a row without bytes behind.
    pub async fn create_upload_request(
        &self,
        owner_id: Uuid,
        intent: UploadIntent,
    ) -> DriveResult<UploadSession> {
        let store = self.object_store()?;

        if intent.size == 0 {
            return Err(DriveError::InvalidSize);
        }
        if intent.size > MAX_FILE_BYTES {
            return Err(DriveError::SizeLimitExceeded {
                size: intent.size,
                limit: MAX_FILE_BYTES,
            });
        }
        ensure_name_valid(&intent.original_name)?;
        ensure_mime_valid(&intent.mime)?;
        ensure_checksum_valid(intent.checksum.as_deref())?;

        let folder_id = intent.folder_id.and_then(FolderRef::id);
        if let Some(id) = folder_id {
            match self.folders.find(id).await? {
                Some(folder) if owns_folder(Some(owner_id), &folder) => {}
                _ => return Err(DriveError::FolderNotFound),
            }
        }

        let file_id = Uuid::new_v4();
        let version = 1;
        let key = storage_key(owner_id, file_id, version);
        let now = Utc::now();
        let file = FileRecord {
            id: file_id,
            owner_id,
            folder_id,
            original_name: intent.original_name,
            mime: intent.mime,
            size: intent.size,
            storage_key: key.clone(),
            checksum: intent.checksum,
            version,
            is_public: intent.is_public.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };
        self.files.insert(&file).await?;

        let upload_id = bounded(
            self.remote_timeout,
            store.open_multipart_session(&key, &file.mime),
        )
        .await
        .map_err(DriveError::UploadInitFailed)?
        .ok_or(DriveError::UploadInitFailed(ObjectStoreError::MissingUploadId))?;

        let total_parts = part_count(file.size, PART_SIZE);
        let ttl = Duration::from_secs(SIGNED_URL_TTL_SECS);
        let limit = self.remote_timeout;
        let (key_ref, upload_ref) = (&key, &upload_id);

        let parts = try_join_all((1..=total_parts).map(|part_number| async move {
            let url = bounded(
                limit,
                store.sign_part_upload_url(key_ref, upload_ref, part_number, ttl),
            )
            .await?;
            Ok::<_, ObjectStoreError>(PartUrl { part_number, url })
        }))
        .await
        .map_err(DriveError::UploadInitFailed)?;

        info!(
            file_id = %file_id,
            owner_id = %owner_id,
            size = file.size,
            parts = total_parts,
            "created upload request"
        );

        Ok(UploadSession {
            file_id,
            upload_id,
            storage_key: key,
            part_size: PART_SIZE,
            parts,
        })
    }

    /// Seal a multipart upload from the client's part ETags.
    ///
    /// Parts are sorted by number before the remote call; the submission
    /// order is not trusted. The declared size is not re-checked against
    /// what was uploaded.
    pub async fn complete_upload(
        &self,
        file_id: Uuid,
        upload_id: &str,
        parts: Vec<PartReceipt>,
    ) -> DriveResult<()> {
        let file = self.files.get(file_id).await?;

        if parts.is_empty() {
            return Err(DriveError::NoPartsSupplied);
        }
        if parts
            .iter()
            .any(|p| p.part_number == 0 || p.part_number > MAX_PART_NUMBER)
        {
            return Err(DriveError::InvalidPartNumber);
        }
        let store = self.object_store()?;

        let mut sorted = parts;
        sorted.sort_by_key(|p| p.part_number);

        bounded(
            self.remote_timeout,
            store.complete_multipart_session(&file.storage_key, upload_id, &sorted),
        )
        .await
        .map_err(DriveError::UploadFinalizeFailed)?;

        info!(file_id = %file_id, parts = sorted.len(), "completed upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        models::{
            file::MAX_FILE_BYTES,
            folder::FolderRef,
            upload::{PART_SIZE, PartReceipt, UploadIntent},
        },
        services::{
            DriveError,
            drive_service::fixtures::{service_with_store, service_without_store},
            object_store::{ObjectStoreError, testing::MemoryObjectStore},
        },
    };
    use std::{sync::atomic::Ordering, time::Duration};
    use uuid::Uuid;

    fn intent(size: u64) -> UploadIntent {
        UploadIntent {
            folder_id: None,
            original_name: "video.mp4".into(),
            mime: "video/mp4".into(),
            size,
            checksum: None,
            is_public: None,
        }
    }

    fn receipt(part_number: u32, e_tag: &str) -> PartReceipt {
        PartReceipt {
            part_number,
            e_tag: e_tag.into(),
        }
    }

    #[tokio::test]
    async fn plan_covers_size_with_contiguous_parts() {
        let (service, store) = service_with_store().await;
        let owner = Uuid::new_v4();

        let session = service
            .create_upload_request(owner, intent(25 * 1024 * 1024))
            .await
            .unwrap();

        assert_eq!(session.part_size, PART_SIZE);
        let numbers: Vec<_> = session.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(session.parts[2].url.contains("partNumber=3"));
        assert!(session.parts[0].url.contains("expires=900"));
        assert!(session.parts[0].url.contains(&session.upload_id));
        assert_eq!(
            session.storage_key,
            format!("u/{}/file/{}/v/1", owner, session.file_id)
        );
        assert!(store.max_in_flight.load(Ordering::SeqCst) > 1);

        let row = service.files.get(session.file_id).await.unwrap();
        assert_eq!(row.size, 25 * 1024 * 1024);
        assert_eq!(row.version, 1);
        assert!(!row.is_public);
        assert_eq!(row.storage_key, session.storage_key);
    }

    #[tokio::test]
    async fn size_limits_are_inclusive_of_two_gib() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();

        let session = service
            .create_upload_request(owner, intent(MAX_FILE_BYTES))
            .await
            .unwrap();
        assert_eq!(session.parts.len(), 205);

        let err = service
            .create_upload_request(owner, intent(MAX_FILE_BYTES + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::SizeLimitExceeded { .. }));

        let err = service
            .create_upload_request(owner, intent(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::InvalidSize));
    }

    #[tokio::test]
    async fn tiny_files_get_a_single_part() {
        let (service, _) = service_with_store().await;
        let session = service
            .create_upload_request(Uuid::new_v4(), intent(1))
            .await
            .unwrap();
        assert_eq!(session.parts.len(), 1);
        assert_eq!(session.parts[0].part_number, 1);
    }

    #[tokio::test]
    async fn missing_bucket_is_checked_before_anything_else() {
        let service = service_without_store().await;
        let err = service
            .create_upload_request(Uuid::new_v4(), intent(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::BucketNotConfigured));
    }

    #[tokio::test]
    async fn target_folder_must_exist_and_belong_to_owner() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();

        let mut missing = intent(10);
        missing.folder_id = Some(FolderRef::Id(Uuid::new_v4()));
        let err = service.create_upload_request(owner, missing).await.unwrap_err();
        assert!(matches!(err, DriveError::FolderNotFound));

        let foreign = service
            .create_folder(Uuid::new_v4(), "theirs", FolderRef::Root)
            .await
            .unwrap();
        let mut into_foreign = intent(10);
        into_foreign.folder_id = Some(FolderRef::Id(foreign.id));
        let err = service
            .create_upload_request(owner, into_foreign)
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::FolderNotFound));

        let mine = service
            .create_folder(owner, "mine", FolderRef::Root)
            .await
            .unwrap();
        let mut into_mine = intent(10);
        into_mine.folder_id = Some(FolderRef::Id(mine.id));
        into_mine.is_public = Some(true);
        let session = service.create_upload_request(owner, into_mine).await.unwrap();
        let row = service.files.get(session.file_id).await.unwrap();
        assert_eq!(row.folder_id, Some(mine.id));
        assert!(row.is_public);
    }

    #[tokio::test]
    async fn remote_init_failures_surface_as_upload_init_failed() {
        let (service, store) = service_with_store().await;
        MemoryObjectStore::set(&store.omit_upload_id);
        let err = service
            .create_upload_request(Uuid::new_v4(), intent(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DriveError::UploadInitFailed(ObjectStoreError::MissingUploadId)
        ));

        let (service, store) = service_with_store().await;
        MemoryObjectStore::set(&store.fail_open);
        let err = service
            .create_upload_request(Uuid::new_v4(), intent(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::UploadInitFailed(_)));
    }

    #[tokio::test]
    async fn a_single_failed_signature_fails_the_whole_plan() {
        let (service, store) = service_with_store().await;
        MemoryObjectStore::set(&store.fail_sign);
        let err = service
            .create_upload_request(Uuid::new_v4(), intent(3 * PART_SIZE))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::UploadInitFailed(_)));
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let (mut service, store) = service_with_store().await;
        service.remote_timeout = Duration::from_millis(20);
        MemoryObjectStore::set(&store.stall_open);

        let err = service
            .create_upload_request(Uuid::new_v4(), intent(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DriveError::UploadInitFailed(ObjectStoreError::Timeout(_))
        ));
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn completion_sorts_parts_before_sealing() {
        let (service, store) = service_with_store().await;
        let session = service
            .create_upload_request(Uuid::new_v4(), intent(25 * 1024 * 1024))
            .await
            .unwrap();

        service
            .complete_upload(
                session.file_id,
                &session.upload_id,
                vec![receipt(3, "e3"), receipt(1, "e1"), receipt(2, "e2")],
            )
            .await
            .unwrap();

        let completed = store.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        let (key, upload_id, parts) = &completed[0];
        assert_eq!(key, &session.storage_key);
        assert_eq!(upload_id, &session.upload_id);
        assert_eq!(
            parts,
            &vec![receipt(1, "e1"), receipt(2, "e2"), receipt(3, "e3")]
        );
    }

    #[tokio::test]
    async fn completion_validates_before_calling_the_store() {
        let (service, store) = service_with_store().await;

        let err = service
            .complete_upload(Uuid::new_v4(), "upload-0", vec![receipt(1, "e1")])
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::FileNotFound));

        let session = service
            .create_upload_request(Uuid::new_v4(), intent(10))
            .await
            .unwrap();
        let err = service
            .complete_upload(session.file_id, &session.upload_id, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::NoPartsSupplied));

        let err = service
            .complete_upload(session.file_id, &session.upload_id, vec![receipt(0, "e0")])
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::InvalidPartNumber));

        for too_high in [10_001, u32::MAX] {
            let err = service
                .complete_upload(
                    session.file_id,
                    &session.upload_id,
                    vec![receipt(1, "e1"), receipt(too_high, "ex")],
                )
                .await
                .unwrap_err();
            assert!(matches!(err, DriveError::InvalidPartNumber));
        }

        assert!(store.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_failures_surface_as_finalize_failed() {
        let (service, store) = service_with_store().await;
        let session = service
            .create_upload_request(Uuid::new_v4(), intent(10))
            .await
            .unwrap();
        MemoryObjectStore::set(&store.fail_complete);

        let err = service
            .complete_upload(session.file_id, &session.upload_id, vec![receipt(1, "e1")])
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::UploadFinalizeFailed(_)));
    }

    #[tokio::test]
    async fn invalid_intents_are_rejected() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();

        let mut bad_mime = intent(10);
        bad_mime.mime = "not a mime".into();
        assert!(matches!(
            service.create_upload_request(owner, bad_mime).await.unwrap_err(),
            DriveError::InvalidMime(_)
        ));

        let mut bad_name = intent(10);
        bad_name.original_name = String::new();
        assert!(matches!(
            service.create_upload_request(owner, bad_name).await.unwrap_err(),
            DriveError::InvalidName(_)
        ));

        let mut bad_checksum = intent(10);
        bad_checksum.checksum = Some("f".repeat(256));
        assert!(matches!(
            service
                .create_upload_request(owner, bad_checksum)
                .await
                .unwrap_err(),
            DriveError::InvalidChecksum(_)
        ));
    }
}
