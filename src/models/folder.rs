//! Represents a node of an owner's folder tree.

use crate::models::file::FileRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A folder owned by a single user.
///
/// Folders form a tree through `parent_id` back-links; children are never
/// embedded. Sibling names are unique per owner, root included.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,

    pub name: String,

    /// Owner of the folder; the only principal that may see or change it.
    pub owner_id: Uuid,

    /// Parent folder, or `None` for a top-level folder.
    pub parent_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Addresses either the implicit root of an owner's tree or a stored folder.
///
/// The wire form is the folder UUID, or the literal `root`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderRef {
    Root,
    Id(Uuid),
}

impl FolderRef {
    pub fn id(self) -> Option<Uuid> {
        match self {
            FolderRef::Root => None,
            FolderRef::Id(id) => Some(id),
        }
    }
}

impl From<Option<Uuid>> for FolderRef {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(FolderRef::Root, FolderRef::Id)
    }
}

impl FromStr for FolderRef {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "root" {
            Ok(FolderRef::Root)
        } else {
            Uuid::parse_str(s).map(FolderRef::Id)
        }
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderRef::Root => f.write_str("root"),
            FolderRef::Id(id) => write!(f, "{}", id),
        }
    }
}

impl<'de> Deserialize<'de> for FolderRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Child folders and visible files of a single folder (or the root).
#[derive(Serialize, Debug)]
pub struct FolderContents {
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}

/// Name matches across folders and files, each list capped independently.
#[derive(Serialize, Debug)]
pub struct SearchResults {
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}
