//! Ownership and visibility rules shared by every file and folder operation.
//!
//! Callers turn a `false` into `DriveError::NotFound`, never into a
//! "forbidden" error, so non-owners cannot probe for existence.

use crate::models::{file::FileRecord, folder::Folder};
use uuid::Uuid;

/// Read or download: the owner, or anyone when the file is public.
pub fn can_read(actor: Option<Uuid>, file: &FileRecord) -> bool {
    file.is_public || actor == Some(file.owner_id)
}

/// Rename or delete: the owner only, public or not.
pub fn can_manage(actor: Option<Uuid>, file: &FileRecord) -> bool {
    actor == Some(file.owner_id)
}

/// Folders have no public flag; only the owner may see or change one.
pub fn owns_folder(actor: Option<Uuid>, folder: &Folder) -> bool {
    actor == Some(folder.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::file_store::fixtures::file_row;
    use chrono::Utc;

    #[test]
    fn private_files_are_owner_only() {
        let owner = Uuid::new_v4();
        let file = file_row(owner, None, "private.txt", false, 0);

        assert!(can_read(Some(owner), &file));
        assert!(can_manage(Some(owner), &file));
        assert!(!can_read(Some(Uuid::new_v4()), &file));
        assert!(!can_read(None, &file));
        assert!(!can_manage(None, &file));
    }

    #[test]
    fn public_files_are_readable_but_not_manageable_by_others() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let file = file_row(owner, None, "public.txt", true, 0);

        assert!(can_read(Some(stranger), &file));
        assert!(can_read(None, &file));
        assert!(!can_manage(Some(stranger), &file));
        assert!(can_manage(Some(owner), &file));
    }

    #[test]
    fn folders_are_owner_only() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            name: "f".into(),
            owner_id: owner,
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(owns_folder(Some(owner), &folder));
        assert!(!owns_folder(Some(Uuid::new_v4()), &folder));
        assert!(!owns_folder(None, &folder));
    }
}
