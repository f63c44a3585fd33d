//! An in-memory `DeviceSession` test double.
//!
//! This crate only has one real backend, so the `DeviceSession` trait
//! exists to separate `LibmtpSession` from this `FakeDevice`, used by every
//! unit test and by the scenario tests that exercise spec.md §8's concrete
//! scenarios end-to-end.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::{FromRawFd, RawFd};
use std::sync::Mutex;

use super::{DeviceSession, RawFile, RawFolder, RawPlaylist, StorageInfo, TrackMetadata};
use crate::errors::DeviceError;
use crate::ids::{FileId, FolderId, PlaylistId, StorageId};

#[derive(Default)]
struct State {
    storages: Vec<StorageInfo>,
    files: Vec<RawFile>,
    folders: HashMap<StorageId, Vec<RawFolder>>,
    playlists: Vec<RawPlaylist>,
    next_id: u32,
}

/// A fully in-process fake of an MTP device, backed by plain `Vec`s.
///
/// Uploads and downloads still round-trip through real file descriptors
/// (dup'd, read/written, never closed by this type) so `StagingStore`
/// integration is exercised faithfully rather than mocked away.
pub struct FakeDevice {
    state: Mutex<State>,
    uploaded_bytes: Mutex<HashMap<u32, Vec<u8>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        FakeDevice {
            state: Mutex::new(State { next_id: 1, ..Default::default() }),
            uploaded_bytes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_storage(self, description: &str) -> Self {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.storages.push(StorageInfo {
            id: StorageId(id),
            description: description.to_string(),
            max_capacity: 64 * 1024 * 1024 * 1024,
            free_bytes: 32 * 1024 * 1024 * 1024,
            free_objects: 100_000,
        });
        state.folders.insert(StorageId(id), Vec::new());
        drop(state);
        self
    }

    pub fn storage_id_named(&self, description: &str) -> Option<StorageId> {
        self.state
            .lock()
            .unwrap()
            .storages
            .iter()
            .find(|s| s.description == description)
            .map(|s| s.id)
    }

    /// Injects a folder directly, bypassing `create_folder`, for test setup.
    pub fn inject_folder(&self, storage: StorageId, parent: FolderId, name: &str) -> FolderId {
        let mut state = self.state.lock().unwrap();
        let id = FolderId(state.next_id);
        state.next_id += 1;
        state
            .folders
            .entry(storage)
            .or_default()
            .push(RawFolder { id, parent_id: parent, storage_id: storage, name: name.to_string() });
        id
    }

    /// Injects a file record directly, e.g. with a dangling `parent_id` to
    /// exercise `LostFoundView` (spec.md §8 scenario 2).
    pub fn inject_file(&self, storage: StorageId, parent: FolderId, filename: &str, size: u64) -> FileId {
        let mut state = self.state.lock().unwrap();
        let id = FileId(state.next_id);
        state.next_id += 1;
        state.files.push(RawFile {
            id,
            parent_id: parent,
            storage_id: storage,
            filename: Some(filename.to_string()),
            size,
            modified: time::OffsetDateTime::now_utc(),
        });
        id
    }

    pub fn inject_playlist(&self, name: &str, track_ids: &[FileId]) -> PlaylistId {
        let mut state = self.state.lock().unwrap();
        let id = PlaylistId(state.next_id);
        state.next_id += 1;
        state.playlists.push(RawPlaylist { id, name: name.to_string(), track_ids: track_ids.to_vec() });
        id
    }

    fn read_fd_to_end(fd: RawFd) -> Vec<u8> {
        let mut file = unsafe { std::fs::File::from_raw_fd(libc::dup(fd)) };
        let _ = file.seek(SeekFrom::Start(0));
        let mut buf = Vec::new();
        let _ = file.read_to_end(&mut buf);
        buf
    }
}

impl DeviceSession for FakeDevice {
    fn list_storages(&self) -> Result<Vec<StorageInfo>, DeviceError> {
        Ok(self.state.lock().unwrap().storages.clone())
    }

    fn list_files(&self) -> Result<Vec<RawFile>, DeviceError> {
        Ok(self.state.lock().unwrap().files.clone())
    }

    fn list_folders(&self, storage: StorageId) -> Result<Vec<RawFolder>, DeviceError> {
        Ok(self.state.lock().unwrap().folders.get(&storage).cloned().unwrap_or_default())
    }

    fn list_playlists(&self) -> Result<Vec<RawPlaylist>, DeviceError> {
        Ok(self.state.lock().unwrap().playlists.clone())
    }

    fn file_metadata(&self, id: FileId) -> Result<RawFile, DeviceError> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| DeviceError::new(-1, "object not found"))
    }

    fn create_folder(&self, storage: StorageId, parent: FolderId, name: &str) -> Result<FolderId, DeviceError> {
        Ok(self.inject_folder(storage, parent, name))
    }

    fn delete_object(&self, id: u32) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.files.retain(|f| f.id.0 != id);
        state.playlists.retain(|p| p.id.0 != id);
        for folders in state.folders.values_mut() {
            folders.retain(|f| f.id.0 != id);
        }
        Ok(())
    }

    fn upload_file(
        &self,
        fd: RawFd,
        size: u64,
        storage: StorageId,
        parent: FolderId,
        filename: &str,
        _filetype: &str,
    ) -> Result<FileId, DeviceError> {
        let bytes = Self::read_fd_to_end(fd);
        let id = self.inject_file(storage, parent, filename, size.max(bytes.len() as u64));
        self.uploaded_bytes.lock().unwrap().insert(id.0, bytes);
        Ok(id)
    }

    fn upload_track(
        &self,
        fd: RawFd,
        size: u64,
        storage: StorageId,
        parent: FolderId,
        filename: &str,
        _metadata: &TrackMetadata,
    ) -> Result<FileId, DeviceError> {
        self.upload_file(fd, size, storage, parent, filename, "MP3")
    }

    fn download_to_fd(&self, id: FileId, fd: RawFd) -> Result<(), DeviceError> {
        let bytes = self.uploaded_bytes.lock().unwrap().get(&id.0).cloned().unwrap_or_default();
        let mut file = unsafe { std::fs::File::from_raw_fd(libc::dup(fd)) };
        file.write_all(&bytes).map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn create_playlist(&self, _storage: StorageId, name: &str, track_ids: &[FileId]) -> Result<PlaylistId, DeviceError> {
        Ok(self.inject_playlist(name, track_ids))
    }

    fn update_playlist(&self, id: PlaylistId, track_ids: &[FileId]) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(pl) = state.playlists.iter_mut().find(|p| p.id == id) {
            pl.track_ids = track_ids.to_vec();
            Ok(())
        } else {
            Err(DeviceError::new(-1, "playlist not found"))
        }
    }

    fn drain_error_stack(&self) {}
}
