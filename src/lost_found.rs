//! `LostFoundView` (spec.md §4.6): files whose parent folder is not present
//! in any storage's cached folder tree, exposed read-only under
//! `/lost+found`.
//!
//! spec.md §9 flags the original `check_lost_files` as apparently
//! sign-inverted relative to its own variable name. This crate follows
//! Invariant 2's plain-English definition directly rather than the C
//! boolean, per the Open Question resolution in `SPEC_FULL.md` §9.

use crate::cache::{FileRecord, ObjectCache};
use crate::ids::FolderId;

/// A file is lost iff its `parent_id` is non-zero and no storage's folder
/// tree has a folder with that id (spec.md Invariant 2).
pub fn is_lost(cache: &ObjectCache, file: &FileRecord) -> bool {
    file.parent_id != FolderId(0) && !cache.storages().iter().any(|s| s.contains_folder(file.parent_id))
}

/// Enumerates lost files in file-list order (spec.md §4.6).
pub fn lost_files<'a>(cache: &'a ObjectCache) -> impl Iterator<Item = &'a FileRecord> {
    cache.files().iter().filter(move |f| is_lost(cache, f))
}

pub fn has_any_lost_file(cache: &ObjectCache) -> bool {
    lost_files(cache).next().is_some()
}

pub fn find_by_filename<'a>(cache: &'a ObjectCache, filename: &str) -> Option<&'a FileRecord> {
    lost_files(cache).find(|f| f.filename.as_deref() == Some(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeDevice;

    #[test]
    fn lost_iff_parent_unresolvable() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;

        let real_folder = device.inject_folder(storage_id, FolderId(0), "Music");
        device.inject_file(storage_id, real_folder, "ok.mp3", 10);
        device.inject_file(storage_id, FolderId(999), "orphan.mp3", 20);

        cache.mark_all_folders_dirty();
        cache.mark_files_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();

        assert!(has_any_lost_file(&cache));
        let lost: Vec<_> = lost_files(&cache).collect();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].filename.as_deref(), Some("orphan.mp3"));
    }

    #[test]
    fn root_parent_is_never_lost() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        device.inject_file(storage_id, FolderId(0), "top.mp3", 10);
        cache.mark_files_dirty();
        cache.refresh_files_if_dirty(&device).unwrap();

        assert!(!has_any_lost_file(&cache));
    }
}
