//! `ObjectCache` (spec.md §4.1): an in-memory mirror of the device's object
//! lists, refreshed lazily and invalidated explicitly by every mutation.
//!
//! Plain owned state threaded through by reference, reached through
//! `FsCore` (see `fsops.rs`), never a `static`.

use std::collections::HashMap;

pub use crate::device::{RawFile as FileRecord, RawFolder as FolderRecord, RawPlaylist as Playlist};
use crate::device::DeviceSession;
use crate::errors::DeviceError;
use crate::ids::{FolderId, StorageId};

/// One storage area: its device descriptor plus its own folder tree and
/// dirty flag (spec.md §3 `StorageArea`, §4.1 "per-storage folder tree").
pub struct StorageArea {
    pub id: StorageId,
    pub description: String,
    pub max_capacity: u64,
    pub free_bytes: u64,
    pub free_objects: u64,
    /// Folder records keyed by id, for the ID-indexed lookup spec.md §9 calls for
    /// instead of pointer chasing.
    folders: HashMap<FolderId, FolderRecord>,
    /// Top-level folders directly under the storage root (`parent_id == 0`).
    roots: Vec<FolderId>,
    folders_dirty: bool,
}

impl StorageArea {
    fn new(info: crate::device::StorageInfo) -> Self {
        StorageArea {
            id: info.id,
            description: info.description,
            max_capacity: info.max_capacity,
            free_bytes: info.free_bytes,
            free_objects: info.free_objects,
            folders: HashMap::new(),
            roots: Vec::new(),
            folders_dirty: true,
        }
    }

    pub fn folder(&self, id: FolderId) -> Option<&FolderRecord> {
        self.folders.get(&id)
    }

    pub fn roots(&self) -> &[FolderId] {
        &self.roots
    }

    pub fn children_of(&self, parent: FolderId) -> impl Iterator<Item = &FolderRecord> {
        self.folders.values().filter(move |f| f.parent_id == parent)
    }

    pub fn contains_folder(&self, id: FolderId) -> bool {
        self.folders.contains_key(&id)
    }

    pub fn mark_dirty(&mut self) {
        self.folders_dirty = true;
    }

    /// Root-to-leaf folder name components for `folder_id`, used by
    /// `PlaylistBridge` to reconstruct a track's path (spec.md §4.5). Stops
    /// (returning a partial list) if the chain runs into an id this storage
    /// doesn't know about — the cache is allowed to be stale or incomplete
    /// per spec.md §6 ("folder trees may be incomplete").
    pub fn path_components(&self, mut folder_id: FolderId) -> Vec<String> {
        let mut names = Vec::new();
        while folder_id != FolderId(0) {
            match self.folders.get(&folder_id) {
                Some(folder) => {
                    names.push(folder.name.clone());
                    folder_id = folder.parent_id;
                }
                None => break,
            }
        }
        names.reverse();
        names
    }
}

/// Mirrors the device's file list, per-storage folder trees and playlist
/// list, each independently dirty-tracked (spec.md §4.1).
pub struct ObjectCache {
    storages: Vec<StorageArea>,
    files: Vec<FileRecord>,
    files_dirty: bool,
    playlists: Vec<Playlist>,
    playlists_dirty: bool,
}

impl ObjectCache {
    /// Enumerates storages once, up to four (spec.md §4.8), and starts every
    /// cache dirty (spec.md §4.1: "initially true").
    pub fn new(device: &dyn DeviceSession) -> Result<Self, DeviceError> {
        let storages = device.list_storages()?.into_iter().map(StorageArea::new).collect();
        Ok(ObjectCache {
            storages,
            files: Vec::new(),
            files_dirty: true,
            playlists: Vec::new(),
            playlists_dirty: true,
        })
    }

    pub fn storages(&self) -> &[StorageArea] {
        &self.storages
    }

    pub fn storage_index_by_description(&self, description: &str) -> Option<usize> {
        self.storages.iter().position(|s| s.description == description)
    }

    // -- files --------------------------------------------------------

    pub fn refresh_files_if_dirty(&mut self, device: &dyn DeviceSession) -> Result<(), DeviceError> {
        if !self.files_dirty {
            return Ok(());
        }
        // Correctness over latency (spec.md §4.1): refresh is a full replace, never incremental.
        let files = device.list_files()?;
        self.files = files;
        self.files_dirty = false;
        Ok(())
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn mark_files_dirty(&mut self) {
        self.files_dirty = true;
    }

    // -- folders --------------------------------------------------------

    pub fn refresh_folders_if_dirty(&mut self, device: &dyn DeviceSession, storage_idx: usize) -> Result<(), DeviceError> {
        let storage_id = match self.storages.get(storage_idx) {
            Some(s) if s.folders_dirty => s.id,
            _ => return Ok(()),
        };
        let raw_folders = device.list_folders(storage_id)?;
        let storage = &mut self.storages[storage_idx];
        storage.folders.clear();
        storage.roots.clear();
        for folder in raw_folders {
            if folder.parent_id == FolderId(0) {
                storage.roots.push(folder.id);
            }
            storage.folders.insert(folder.id, folder);
        }
        storage.folders_dirty = false;
        Ok(())
    }

    pub fn mark_folders_dirty(&mut self, storage_idx: usize) {
        if let Some(storage) = self.storages.get_mut(storage_idx) {
            storage.mark_dirty();
        }
    }

    pub fn mark_all_folders_dirty(&mut self) {
        for storage in &mut self.storages {
            storage.mark_dirty();
        }
    }

    // -- playlists --------------------------------------------------------

    pub fn refresh_playlists_if_dirty(&mut self, device: &dyn DeviceSession) -> Result<(), DeviceError> {
        if !self.playlists_dirty {
            return Ok(());
        }
        self.playlists = device.list_playlists()?;
        self.playlists_dirty = false;
        Ok(())
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn mark_playlists_dirty(&mut self) {
        self.playlists_dirty = true;
    }

    pub fn playlist_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeDevice;

    #[test]
    fn refresh_clears_dirty_and_is_idempotent() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        assert_eq!(cache.storages().len(), 1);

        cache.refresh_files_if_dirty(&device).unwrap();
        assert!(cache.files().is_empty());

        let storage_id = cache.storages()[0].id;
        device.inject_file(storage_id, FolderId(0), "a.mp3", 10);
        // Without marking dirty, the stale (empty) list is still what's served.
        cache.refresh_files_if_dirty(&device).unwrap();
        assert!(cache.files().is_empty());

        cache.mark_files_dirty();
        cache.refresh_files_if_dirty(&device).unwrap();
        assert_eq!(cache.files().len(), 1);
    }

    #[test]
    fn mutation_marks_the_right_flag_only() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();
        assert!(!cache.storages()[0].folders_dirty);
        assert!(!cache.files_dirty);

        cache.mark_folders_dirty(0);
        assert!(cache.storages()[0].folders_dirty);
        assert!(!cache.files_dirty);
    }
}
