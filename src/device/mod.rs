//! The MTP driver boundary (spec.md §4.8).
//!
//! `DeviceSession` is the thin typed contract the rest of this crate talks
//! to; it is deliberately ignorant of paths, caching or FUSE. The real
//! implementation (`backend`) is a safe wrapper over `libmtp-rs`. There is
//! only ever one kind of real device here, so the trait exists for
//! testability (`fake`) rather than to unify several backends.

pub mod backend;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use std::os::unix::io::RawFd;

use crate::errors::DeviceError;
use crate::ids::{FileId, FolderId, PlaylistId, StorageId};

/// One storage area as reported by the device (spec.md §3 `StorageArea`,
/// the descriptor half only — the folder tree lives in `cache::StorageArea`).
#[derive(Debug, Clone)]
pub struct StorageInfo {
    pub id: StorageId,
    pub description: String,
    pub max_capacity: u64,
    pub free_bytes: u64,
    pub free_objects: u64,
}

/// A plain file or track object as listed by the device (spec.md §3 `FileRecord`).
#[derive(Debug, Clone)]
pub struct RawFile {
    pub id: FileId,
    pub parent_id: FolderId,
    pub storage_id: StorageId,
    pub filename: Option<String>,
    pub size: u64,
    pub modified: time::OffsetDateTime,
}

/// A folder object (spec.md §3 `FolderRecord`).
#[derive(Debug, Clone)]
pub struct RawFolder {
    pub id: FolderId,
    pub parent_id: FolderId,
    pub storage_id: StorageId,
    pub name: String,
}

/// A playlist object (spec.md §3 `Playlist`).
#[derive(Debug, Clone)]
pub struct RawPlaylist {
    pub id: PlaylistId,
    pub name: String,
    pub track_ids: Vec<FileId>,
}

pub const UNKNOWN_TAG: &str = "<Unknown>";

/// Metadata the `TagEnricher` fills in for an MP3 upload (spec.md §4.4).
///
/// Fields default to the literal token `<Unknown>` rather than being
/// `Option`, matching spec.md §4.4.3 ("fills missing string fields with
/// the literal token `<Unknown>`") and §7's tag-extraction error policy.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub genre: String,
    pub year: String,
    pub track_number: String,
    pub duration_ms: u64,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        TrackMetadata {
            artist: UNKNOWN_TAG.to_string(),
            title: UNKNOWN_TAG.to_string(),
            album: UNKNOWN_TAG.to_string(),
            genre: UNKNOWN_TAG.to_string(),
            year: UNKNOWN_TAG.to_string(),
            track_number: UNKNOWN_TAG.to_string(),
            duration_ms: 0,
        }
    }
}

/// The contract `ObjectCache` and `FSOps` drive the device through.
///
/// Every method here talks in device-wide terms (no paths). Implementations
/// are expected to call `drain_error_stack` after a failing call, as the
/// original `mtpfs.c` does after every libmtp error (spec.md §4.8, §6).
pub trait DeviceSession: Send {
    /// Enumerate up to four storages (spec.md §4.8: "record up to 4, discard the rest").
    fn list_storages(&self) -> Result<Vec<StorageInfo>, DeviceError>;

    /// Every file/track object on the device, across all storages.
    fn list_files(&self) -> Result<Vec<RawFile>, DeviceError>;

    /// The folder tree belonging to a single storage.
    fn list_folders(&self, storage: StorageId) -> Result<Vec<RawFolder>, DeviceError>;

    /// All playlists on the device.
    fn list_playlists(&self) -> Result<Vec<RawPlaylist>, DeviceError>;

    /// Metadata for a single object, used by `PlaylistBridge` to reconstruct paths.
    fn file_metadata(&self, id: FileId) -> Result<RawFile, DeviceError>;

    fn create_folder(&self, storage: StorageId, parent: FolderId, name: &str) -> Result<FolderId, DeviceError>;

    /// Deletes any object (file, folder or playlist) by id.
    fn delete_object(&self, id: u32) -> Result<(), DeviceError>;

    /// Uploads a plain (non-audio) file from an already-open local descriptor.
    ///
    /// `filetype` is the MTP filetype tag classified from the extension
    /// (spec.md §6's table, `crate::filetype::from_extension`), passed
    /// through so the driver doesn't have to re-derive it.
    fn upload_file(
        &self,
        fd: RawFd,
        size: u64,
        storage: StorageId,
        parent: FolderId,
        filename: &str,
        filetype: &str,
    ) -> Result<FileId, DeviceError>;

    /// Uploads an MP3 with a populated track metadata record (spec.md §4.4.4).
    fn upload_track(
        &self,
        fd: RawFd,
        size: u64,
        storage: StorageId,
        parent: FolderId,
        filename: &str,
        metadata: &TrackMetadata,
    ) -> Result<FileId, DeviceError>;

    /// Downloads an entire object into an already-open local descriptor.
    fn download_to_fd(&self, id: FileId, fd: RawFd) -> Result<(), DeviceError>;

    fn create_playlist(&self, storage: StorageId, name: &str, track_ids: &[FileId]) -> Result<PlaylistId, DeviceError>;

    fn update_playlist(&self, id: PlaylistId, track_ids: &[FileId]) -> Result<(), DeviceError>;

    /// Dumps the driver's error stack to the log and clears it (spec.md §4.8, §6).
    fn drain_error_stack(&self);
}
