//! FolderStore: the folder tree plus the folder-scoped views over files
//! (contents, search) and the cascading subtree delete.
//!
//! Folders are rows keyed by id with a `parent_id` back-link; nothing in
//! memory holds child pointers. Sibling-name uniqueness is owned by the
//! `folders_owner_parent_name` index, and a conflicting write is translated
//! into `DriveError::DuplicateName` rather than checked ahead of time.

use crate::{
    models::{
        file::FileRecord,
        folder::{Folder, FolderContents, FolderRef, SearchResults},
    },
    services::{
        DriveError, DriveResult, ensure_name_valid, fold_name,
        file_store::{FILE_COLUMNS, is_foreign_key_violation},
        is_unique_violation,
    },
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const FOLDER_COLUMNS: &str = "id, name, owner_id, parent_id, created_at, updated_at";

/// Upper bound on each list returned by `search_by_name`.
pub const SEARCH_LIMIT: i64 = 50;

/// Ids per `IN (...)` list; keeps well clear of SQLite's bind limit.
const ID_CHUNK: usize = 500;

/// Outcome of a cascading folder delete.
#[derive(Debug, Default)]
pub struct RemovedSubtree {
    /// Every removed folder, the subtree root first.
    pub folder_ids: Vec<Uuid>,
    /// Storage keys of every removed file; their objects still need reclaiming.
    pub storage_keys: Vec<String>,
    /// Keys whose objects could not be deleted after the rows were removed.
    pub unreclaimed_keys: Vec<String>,
}

#[derive(Clone)]
pub struct FolderStore {
    pub db: Arc<SqlitePool>,
}

impl FolderStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create a folder under `parent_id`, or at the owner's root.
    ///
    /// Parent existence is enforced by the foreign key: an unknown parent is
    /// `ParentNotFound`. A sibling with the same name for this owner is
    /// `DuplicateName`. Ownership of the parent is the caller's check.
    pub async fn create_folder(
        &self,
        name: &str,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> DriveResult<Folder> {
        ensure_name_valid(name)?;

        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            parent_id,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            "INSERT INTO folders (id, name, name_folded, owner_id, parent_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(folder.id)
        .bind(&folder.name)
        .bind(fold_name(&folder.name))
        .bind(folder.owner_id)
        .bind(folder.parent_id)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => {
                debug!(folder_id = %folder.id, owner_id = %owner_id, "created folder");
                Ok(folder)
            }
            Err(err) if is_unique_violation(&err) => Err(DriveError::DuplicateName(name.into())),
            Err(err) if is_foreign_key_violation(&err) => Err(DriveError::ParentNotFound),
            Err(err) => Err(DriveError::Sqlx(err)),
        }
    }

    /// Child folders of `parent_id` (root when `None`) owned by `owner_id`,
    /// ordered by name.
    pub async fn list_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> DriveResult<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND parent_id IS ?
             ORDER BY name ASC"
        ))
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(folders)
    }

    pub async fn find(&self, id: Uuid) -> DriveResult<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(folder)
    }

    pub async fn get_folder(&self, id: Uuid) -> DriveResult<Folder> {
        self.find(id).await?.ok_or(DriveError::NotFound)
    }

    /// Child folders and visible files of a folder.
    ///
    /// Files are visible when owned by `owner_id` or public. A non-root
    /// folder must exist and belong to `owner_id`.
    pub async fn get_contents(
        &self,
        owner_id: Uuid,
        folder: FolderRef,
    ) -> DriveResult<FolderContents> {
        let folder_id = folder.id();
        if let Some(id) = folder_id {
            match self.find(id).await? {
                Some(found) if found.owner_id == owner_id => {}
                _ => return Err(DriveError::NotFound),
            }
        }

        let folders = self.list_children(owner_id, folder_id).await?;
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE (owner_id = ? OR is_public = 1) AND folder_id IS ?
             ORDER BY original_name ASC"
        ))
        .bind(owner_id)
        .bind(folder_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(FolderContents { folders, files })
    }

    /// Rename a folder in place; the sibling-name rule applies as on create.
    pub async fn rename_folder(&self, id: Uuid, new_name: &str) -> DriveResult<Folder> {
        ensure_name_valid(new_name)?;
        let result = sqlx::query_as::<_, Folder>(&format!(
            "UPDATE folders SET name = ?, name_folded = ?, updated_at = ? WHERE id = ?
             RETURNING {FOLDER_COLUMNS}"
        ))
        .bind(new_name)
        .bind(fold_name(new_name))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.db)
        .await;

        match result {
            Ok(Some(folder)) => Ok(folder),
            Ok(None) => Err(DriveError::NotFound),
            Err(err) if is_unique_violation(&err) => {
                Err(DriveError::DuplicateName(new_name.into()))
            }
            Err(err) => Err(DriveError::Sqlx(err)),
        }
    }

    /// Delete a folder with every descendant folder and file row.
    ///
    /// The subtree is collected breadth-first and removed inside one
    /// transaction; on any error nothing is deleted. Object bytes are not
    /// touched here: the returned storage keys are the caller's to reclaim.
    /// When `can_reclaim` is false a subtree holding files is refused with
    /// `BucketNotConfigured`, since its keys would otherwise be lost.
    pub async fn remove_folder(&self, id: Uuid, can_reclaim: bool) -> DriveResult<RemovedSubtree> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DriveError::NotFound);
        }

        let folder_ids = collect_subtree(&mut *tx, id).await?;

        let mut storage_keys = Vec::new();
        for chunk in folder_ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT storage_key FROM files WHERE folder_id IN ",
            );
            push_id_list(&mut qb, chunk);
            let keys: Vec<String> = qb.build_query_scalar().fetch_all(&mut *tx).await?;
            storage_keys.extend(keys);
        }
        if !can_reclaim && !storage_keys.is_empty() {
            return Err(DriveError::BucketNotConfigured);
        }

        let mut files_removed = 0;
        for chunk in folder_ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM files WHERE folder_id IN ");
            push_id_list(&mut qb, chunk);
            files_removed += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        // leaves first, so no chunk depends on a parent cascade
        for chunk in folder_ids.rchunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM folders WHERE id IN ");
            push_id_list(&mut qb, chunk);
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        info!(
            folder_id = %id,
            folders = folder_ids.len(),
            files = files_removed,
            "removed folder subtree"
        );

        Ok(RemovedSubtree {
            folder_ids,
            storage_keys,
            unreclaimed_keys: Vec::new(),
        })
    }

    /// Case-insensitive substring search over folder and file names.
    ///
    /// Folders must belong to `owner_id`; files must be owned or public.
    /// Each list holds at most `SEARCH_LIMIT` rows: folders by name, files
    /// most recently updated first. Names and the term are compared in
    /// their `fold_name` form, and `%`/`_` in the term match literally.
    pub async fn search_by_name(&self, owner_id: Uuid, term: &str) -> DriveResult<SearchResults> {
        let term = term.trim();
        if term.is_empty() {
            return Err(DriveError::InvalidSearchTerm);
        }
        let pattern = format!("%{}%", escape_like(&fold_name(term)));

        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND name_folded LIKE ? ESCAPE '\\'
             ORDER BY name ASC LIMIT ?"
        ))
        .bind(owner_id)
        .bind(&pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&*self.db)
        .await?;

        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE (owner_id = ? OR is_public = 1) AND name_folded LIKE ? ESCAPE '\\'
             ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(owner_id)
        .bind(&pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&*self.db)
        .await?;

        Ok(SearchResults { folders, files })
    }
}

/// Breadth-first walk from `root` over `parent_id` links.
async fn collect_subtree(conn: &mut SqliteConnection, root: Uuid) -> DriveResult<Vec<Uuid>> {
    let mut all = vec![root];
    let mut frontier = vec![root];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for chunk in frontier.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM folders WHERE parent_id IN ");
            push_id_list(&mut qb, chunk);
            let children: Vec<Uuid> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
            next.extend(children);
        }
        all.extend_from_slice(&next);
        frontier = next;
    }

    Ok(all)
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
