//! DriveService: owner-scoped operations over the folder tree and file
//! metadata, plus the object-store side effects they imply.
//!
//! This is the state shared with every HTTP handler. Upload orchestration
//! lives in `upload.rs` and download links in `download.rs`, both as
//! further `impl DriveService` blocks.

use crate::{
    models::{
        file::FileRecord,
        folder::{Folder, FolderContents, FolderRef, SearchResults},
    },
    services::{
        DriveError, DriveResult,
        access::{can_manage, owns_folder},
        ensure_name_valid,
        file_store::FileStore,
        folder_store::{FolderStore, RemovedSubtree},
        object_store::{ObjectStore, bounded},
    },
};
use futures::{StreamExt, stream};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Concurrent object deletions while reclaiming a removed subtree.
const RECLAIM_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct DriveService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    pub folders: FolderStore,

    pub files: FileStore,

    /// `None` when no bucket is configured; anything that needs the store
    /// then fails with `BucketNotConfigured`.
    pub objects: Option<Arc<dyn ObjectStore>>,

    /// Bound applied to every remote object-store call.
    pub remote_timeout: Duration,
}

impl DriveService {
    pub fn new(
        db: Arc<SqlitePool>,
        objects: Option<Arc<dyn ObjectStore>>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            folders: FolderStore::new(db.clone()),
            files: FileStore::new(db.clone()),
            db,
            objects,
            remote_timeout,
        }
    }

    pub(crate) fn object_store(&self) -> DriveResult<&Arc<dyn ObjectStore>> {
        self.objects.as_ref().ok_or(DriveError::BucketNotConfigured)
    }

    /// Fetch a folder the actor owns; anything else is `NotFound`.
    async fn owned_folder(&self, actor: Uuid, id: Uuid) -> DriveResult<Folder> {
        match self.folders.find(id).await? {
            Some(folder) if owns_folder(Some(actor), &folder) => Ok(folder),
            _ => Err(DriveError::NotFound),
        }
    }

    /// Fetch a file the actor may manage; anything else is `NotFound`.
    async fn managed_file(&self, actor: Uuid, id: Uuid) -> DriveResult<FileRecord> {
        match self.files.find(id).await? {
            Some(file) if can_manage(Some(actor), &file) => Ok(file),
            _ => Err(DriveError::NotFound),
        }
    }

    pub async fn create_folder(
        &self,
        actor: Uuid,
        name: &str,
        parent: FolderRef,
    ) -> DriveResult<Folder> {
        if let Some(parent_id) = parent.id() {
            self.owned_folder(actor, parent_id)
                .await
                .map_err(|err| match err {
                    DriveError::NotFound => DriveError::ParentNotFound,
                    other => other,
                })?;
        }
        self.folders.create_folder(name, actor, parent.id()).await
    }

    pub async fn list_folders(&self, actor: Uuid, parent: FolderRef) -> DriveResult<Vec<Folder>> {
        self.folders.list_children(actor, parent.id()).await
    }

    pub async fn get_folder(&self, actor: Uuid, id: Uuid) -> DriveResult<Folder> {
        self.owned_folder(actor, id).await
    }

    pub async fn folder_contents(
        &self,
        actor: Uuid,
        folder: FolderRef,
    ) -> DriveResult<FolderContents> {
        self.folders.get_contents(actor, folder).await
    }

    pub async fn rename_folder(&self, actor: Uuid, id: Uuid, name: &str) -> DriveResult<Folder> {
        self.owned_folder(actor, id).await?;
        self.folders.rename_folder(id, name).await
    }

    /// Delete a folder subtree, then reclaim the objects of its files.
    ///
    /// Metadata goes first and atomically. A subtree holding files is only
    /// removed when a bucket is configured. Object deletion afterwards is
    /// best effort: keys that could not be deleted are logged and returned
    /// in `unreclaimed_keys`, never a row pointing at missing bytes.
    pub async fn remove_folder(&self, actor: Uuid, id: Uuid) -> DriveResult<RemovedSubtree> {
        self.owned_folder(actor, id).await?;
        let store = self.objects.as_ref();
        let mut removed = self.folders.remove_folder(id, store.is_some()).await?;

        let Some(store) = store else {
            return Ok(removed);
        };

        let limit = self.remote_timeout;
        removed.unreclaimed_keys = stream::iter(removed.storage_keys.clone())
            .map(|key| async move {
                match bounded(limit, store.delete_object(&key)).await {
                    Ok(()) => {
                        debug!(key = %key, "reclaimed object");
                        None
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "failed to reclaim object");
                        Some(key)
                    }
                }
            })
            .buffer_unordered(RECLAIM_CONCURRENCY)
            .filter_map(|failed| async move { failed })
            .collect()
            .await;

        Ok(removed)
    }

    pub async fn search(&self, actor: Uuid, term: &str) -> DriveResult<SearchResults> {
        self.folders.search_by_name(actor, term).await
    }

    /// Files in a folder (or the root) that the actor owns or that are
    /// public, newest first. The folder only has to exist.
    pub async fn list_files(&self, actor: Uuid, folder: FolderRef) -> DriveResult<Vec<FileRecord>> {
        if let Some(id) = folder.id() {
            self.folders.get_folder(id).await?;
        }
        self.files.list_visible(actor, folder.id()).await
    }

    pub async fn list_public_files(&self, folder: FolderRef) -> DriveResult<Vec<FileRecord>> {
        if let Some(id) = folder.id() {
            self.folders.get_folder(id).await?;
        }
        self.files.list_public(folder.id()).await
    }

    pub async fn rename_file(&self, actor: Uuid, id: Uuid, name: &str) -> DriveResult<FileRecord> {
        ensure_name_valid(name)?;
        self.managed_file(actor, id).await?;
        self.files.rename(id, name).await
    }

    /// Delete the stored object, then the metadata row.
    ///
    /// If the object delete fails the row stays, so the call can be retried.
    pub async fn delete_file(&self, actor: Uuid, id: Uuid) -> DriveResult<()> {
        let file = self.managed_file(actor, id).await?;
        let store = self.object_store()?;

        bounded(self.remote_timeout, store.delete_object(&file.storage_key))
            .await
            .map_err(DriveError::ObjectDeleteFailed)?;
        self.files.delete(file.id).await?;

        info!(file_id = %file.id, key = %file.storage_key, "deleted file");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::services::{
        file_store::fixtures::file_row, object_store::testing::MemoryObjectStore,
    };

    #[tokio::test]
    async fn folder_operations_hide_foreign_folders() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let folder = service
            .create_folder(owner, "private", FolderRef::Root)
            .await
            .unwrap();

        assert!(matches!(
            service.get_folder(intruder, folder.id).await.unwrap_err(),
            DriveError::NotFound
        ));
        assert!(matches!(
            service.rename_folder(intruder, folder.id, "x").await.unwrap_err(),
            DriveError::NotFound
        ));
        assert!(matches!(
            service.remove_folder(intruder, folder.id).await.unwrap_err(),
            DriveError::NotFound
        ));
        assert!(matches!(
            service
                .create_folder(intruder, "nested", FolderRef::Id(folder.id))
                .await
                .unwrap_err(),
            DriveError::ParentNotFound
        ));

        assert_eq!(service.get_folder(owner, folder.id).await.unwrap().name, "private");
    }

    #[tokio::test]
    async fn remove_folder_reclaims_objects_of_contained_files() {
        let (service, store) = service_with_store().await;
        let owner = Uuid::new_v4();
        let top = service.create_folder(owner, "top", FolderRef::Root).await.unwrap();
        let sub = service
            .create_folder(owner, "sub", FolderRef::Id(top.id))
            .await
            .unwrap();
        let a = file_row(owner, Some(top.id), "a", false, 0);
        let b = file_row(owner, Some(sub.id), "b", false, 0);
        service.files.insert(&a).await.unwrap();
        service.files.insert(&b).await.unwrap();

        let removed = service.remove_folder(owner, top.id).await.unwrap();
        assert_eq!(removed.folder_ids.len(), 2);
        assert!(removed.unreclaimed_keys.is_empty());

        let mut deleted = store.deleted.lock().unwrap().clone();
        deleted.sort();
        let mut expected = vec![a.storage_key, b.storage_key];
        expected.sort();
        assert_eq!(deleted, expected);
    }

    #[tokio::test]
    async fn remove_folder_survives_reclaim_failures() {
        let (service, store) = service_with_store().await;
        MemoryObjectStore::set(&store.fail_delete);
        let owner = Uuid::new_v4();
        let top = service.create_folder(owner, "top", FolderRef::Root).await.unwrap();
        service
            .files
            .insert(&file_row(owner, Some(top.id), "a", false, 0))
            .await
            .unwrap();

        let removed = service.remove_folder(owner, top.id).await.unwrap();
        assert_eq!(removed.storage_keys.len(), 1);
        assert_eq!(removed.unreclaimed_keys, removed.storage_keys);
        assert!(service.folders.find(top.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_folder_with_files_needs_a_bucket() {
        let service = service_without_store().await;
        let owner = Uuid::new_v4();
        let top = service.create_folder(owner, "top", FolderRef::Root).await.unwrap();
        let sub = service
            .create_folder(owner, "sub", FolderRef::Id(top.id))
            .await
            .unwrap();
        let file = file_row(owner, Some(sub.id), "a", false, 0);
        service.files.insert(&file).await.unwrap();

        let err = service.remove_folder(owner, top.id).await.unwrap_err();
        assert!(matches!(err, DriveError::BucketNotConfigured));
        assert!(service.folders.find(top.id).await.unwrap().is_some());
        assert!(service.folders.find(sub.id).await.unwrap().is_some());
        assert!(service.files.find(file.id).await.unwrap().is_some());

        // a subtree without files has nothing to reclaim
        let empty = service.create_folder(owner, "empty", FolderRef::Root).await.unwrap();
        let removed = service.remove_folder(owner, empty.id).await.unwrap();
        assert_eq!(removed.folder_ids, vec![empty.id]);
        assert!(removed.unreclaimed_keys.is_empty());
    }

    #[tokio::test]
    async fn rename_file_requires_ownership_even_when_public() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();
        let file = file_row(owner, None, "shared.txt", true, 0);
        service.files.insert(&file).await.unwrap();

        let err = service
            .rename_file(Uuid::new_v4(), file.id, "stolen.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::NotFound));

        let renamed = service.rename_file(owner, file.id, "mine.txt").await.unwrap();
        assert_eq!(renamed.original_name, "mine.txt");

        let err = service.rename_file(owner, file.id, "").await.unwrap_err();
        assert!(matches!(err, DriveError::InvalidName(_)));
    }

    #[tokio::test]
    async fn delete_file_removes_object_then_row() {
        let (service, store) = service_with_store().await;
        let owner = Uuid::new_v4();
        let file = file_row(owner, None, "gone.txt", false, 0);
        service.files.insert(&file).await.unwrap();

        let err = service.delete_file(Uuid::new_v4(), file.id).await.unwrap_err();
        assert!(matches!(err, DriveError::NotFound));

        service.delete_file(owner, file.id).await.unwrap();
        assert_eq!(*store.deleted.lock().unwrap(), vec![file.storage_key.clone()]);
        assert!(service.files.find(file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_object_delete_keeps_the_row() {
        let (service, store) = service_with_store().await;
        MemoryObjectStore::set(&store.fail_delete);
        let owner = Uuid::new_v4();
        let file = file_row(owner, None, "sticky.txt", false, 0);
        service.files.insert(&file).await.unwrap();

        let err = service.delete_file(owner, file.id).await.unwrap_err();
        assert!(matches!(err, DriveError::ObjectDeleteFailed(_)));
        assert!(service.files.find(file.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_file_needs_a_bucket() {
        let service = service_without_store().await;
        let owner = Uuid::new_v4();
        let file = file_row(owner, None, "a.txt", false, 0);
        service.files.insert(&file).await.unwrap();

        let err = service.delete_file(owner, file.id).await.unwrap_err();
        assert!(matches!(err, DriveError::BucketNotConfigured));
    }

    #[tokio::test]
    async fn public_listing_requires_existing_folder() {
        let (service, _) = service_with_store().await;
        let owner = Uuid::new_v4();
        let dir = service.create_folder(owner, "pub", FolderRef::Root).await.unwrap();
        service
            .files
            .insert(&file_row(owner, Some(dir.id), "open.txt", true, 0))
            .await
            .unwrap();
        service
            .files
            .insert(&file_row(owner, Some(dir.id), "closed.txt", false, 0))
            .await
            .unwrap();

        let public = service.list_public_files(FolderRef::Id(dir.id)).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].original_name, "open.txt");

        let visible = service
            .list_files(Uuid::new_v4(), FolderRef::Id(dir.id))
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);

        let err = service
            .list_public_files(FolderRef::Id(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::NotFound));
    }
}
