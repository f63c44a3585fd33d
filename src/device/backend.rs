//! `DeviceSession` implemented over `libmtp-rs`, the safe wrapper around
//! libmtp this crate leans on for all actual USB/PTP traffic (see
//! `examples/other_examples/*libmtp-rs*` in the retrieval pack this crate
//! was grounded on, and `original_source/mtpfs.c`, which calls the same
//! underlying libmtp entry points by their C names).
//!
//! This module is the only place that touches `libmtp_rs` types; everything
//! above it (`ObjectCache`, `FSOps`, ...) only ever sees `device::{RawFile,
//! RawFolder, RawPlaylist, StorageInfo, TrackMetadata}`.

use std::os::unix::io::RawFd;

use libmtp_rs::device::raw::{detect_raw_devices, RawDevice};
use libmtp_rs::device::MtpDevice;
use libmtp_rs::object::ObjectId;
use libmtp_rs::storage::{
    files::FileMetadata as LibFileMetadata, folders::Folder as LibFolder, Parent, Storage, StoragePool,
};

use super::{DeviceSession, RawFile, RawFolder, RawPlaylist, StorageInfo, TrackMetadata};
use crate::errors::DeviceError;
use crate::ids::{FileId, FolderId, PlaylistId, StorageId};

/// An opened MTP session, holding the device handle for as long as the
/// filesystem is mounted.
///
/// All access is already serialized by `FSOps`'s single device mutex (spec.md
/// §5), so this type does not need interior locking of its own; it is `Send`
/// but not `Sync`, matching how `fuser` drives a single-threaded `Filesystem`.
pub struct LibmtpSession {
    device: MtpDevice,
}

impl LibmtpSession {
    /// Opens the first raw device found, or the one matching `wanted_name`
    /// (by friendly name / serial) if given. Mirrors the contract of
    /// spec.md §6 "CLI/mount-option parsing, device enumeration/selection
    /// at startup", which this crate treats as in scope since it is the
    /// whole daemon rather than a library consumer of one.
    pub fn open(wanted_name: Option<&str>) -> Result<Self, DeviceError> {
        let raw_devices = detect_raw_devices()
            .map_err(|err| DeviceError::new(-1, format!("failed to enumerate MTP devices: {err}")))?;

        let chosen: &RawDevice = match wanted_name {
            None => raw_devices
                .first()
                .ok_or_else(|| DeviceError::new(-1, "no MTP device found".to_string()))?,
            Some(name) => raw_devices
                .iter()
                .find(|dev| dev.friendly_name().as_deref() == Some(name))
                .ok_or_else(|| DeviceError::new(-1, format!("no MTP device named {name}")))?,
        };

        let device = chosen
            .open_uncached()
            .ok_or_else(|| DeviceError::new(-1, "failed to open MTP device".to_string()))?;

        Ok(Self { device })
    }

    fn storage_pool(&self) -> &StoragePool {
        self.device.storage_pool()
    }

    fn find_storage(&self, id: StorageId) -> Result<Storage<'_>, DeviceError> {
        self.storage_pool()
            .by_id(id.0)
            .ok_or_else(|| DeviceError::new(-1, format!("storage {} is no longer present", id.0)))
    }

    fn raw_file_from(file: &libmtp_rs::storage::files::File<'_>) -> RawFile {
        RawFile {
            id: FileId(file.id()),
            parent_id: match file.parent_id() {
                Parent::Root => FolderId(0),
                Parent::Folder(id) => FolderId(id),
            },
            storage_id: StorageId(file.storage_id()),
            filename: Some(file.file_name().to_string()),
            size: file.file_size(),
            modified: file
                .modification_date()
                .map(|dt| {
                    time::OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
                })
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH),
        }
    }

    fn flatten_folder(storage_id: StorageId, folder: &LibFolder<'_>, out: &mut Vec<RawFolder>) {
        out.push(RawFolder {
            id: FolderId(folder.id()),
            parent_id: match folder.parent_id() {
                Parent::Root => FolderId(0),
                Parent::Folder(id) => FolderId(id),
            },
            storage_id,
            name: folder.name().to_string(),
        });
        for child in folder.children() {
            Self::flatten_folder(storage_id, &child, out);
        }
    }
}

impl DeviceSession for LibmtpSession {
    fn list_storages(&self) -> Result<Vec<StorageInfo>, DeviceError> {
        // spec.md §4.8: "record up to 4, discard the rest" — a documented limitation.
        Ok(self
            .storage_pool()
            .iter()
            .take(4)
            .map(|storage| StorageInfo {
                id: StorageId(storage.id()),
                description: storage.description().unwrap_or("").to_string(),
                max_capacity: storage.maximum_capacity(),
                free_bytes: storage.free_space_in_bytes(),
                free_objects: storage.free_space_in_objects(),
            })
            .collect())
    }

    fn list_files(&self) -> Result<Vec<RawFile>, DeviceError> {
        let mut files = Vec::new();
        for storage in self.storage_pool().iter() {
            for file in storage.files_and_folders(Parent::Root) {
                if file.is_file_like() {
                    files.push(Self::raw_file_from(&file));
                }
            }
        }
        Ok(files)
    }

    fn list_folders(&self, storage: StorageId) -> Result<Vec<RawFolder>, DeviceError> {
        let storage = self.find_storage(storage)?;
        let mut out = Vec::new();
        if let Some(root) = storage.folder_list() {
            Self::flatten_folder(StorageId(storage.id()), &root, &mut out);
            for sibling in root.siblings() {
                Self::flatten_folder(StorageId(storage.id()), &sibling, &mut out);
            }
        }
        Ok(out)
    }

    fn list_playlists(&self) -> Result<Vec<RawPlaylist>, DeviceError> {
        Ok(self
            .device
            .playlists()
            .map_err(|err| DeviceError::new(-1, err.to_string()))?
            .into_iter()
            .map(|pl| RawPlaylist {
                id: PlaylistId(pl.id()),
                name: pl.name().to_string(),
                track_ids: pl.tracks().iter().map(|id| FileId(*id)).collect(),
            })
            .collect())
    }

    fn file_metadata(&self, id: FileId) -> Result<RawFile, DeviceError> {
        let object = self
            .device
            .get_object(ObjectId(id.0))
            .map_err(|err| DeviceError::new(-1, err.to_string()))?;
        Ok(Self::raw_file_from(&object))
    }

    fn create_folder(&self, storage: StorageId, parent: FolderId, name: &str) -> Result<FolderId, DeviceError> {
        let storage = self.find_storage(storage)?;
        let parent = if parent.0 == 0 { Parent::Root } else { Parent::Folder(parent.0) };
        storage
            .create_folder(name, parent)
            .map(|(id, _name)| FolderId(id))
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn delete_object(&self, id: u32) -> Result<(), DeviceError> {
        self.device
            .delete_object(ObjectId(id))
            .map_err(|err| DeviceError::new(-1, err.to_string()))
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
        // libmtp derives the MTP filetype tag from the filename extension itself,
        // so the classification this crate computed is not re-passed here.
        let storage = self.find_storage(storage)?;
        let parent = if parent.0 == 0 { Parent::Root } else { Parent::Folder(parent.0) };
        let metadata = LibFileMetadata::new(filename, size);
        storage
            .send_file_from_descriptor(fd, parent, metadata)
            .map(|file| FileId(file.id()))
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn upload_track(
        &self,
        fd: RawFd,
        size: u64,
        storage: StorageId,
        parent: FolderId,
        filename: &str,
        metadata: &TrackMetadata,
    ) -> Result<FileId, DeviceError> {
        let storage = self.find_storage(storage)?;
        let parent = if parent.0 == 0 { Parent::Root } else { Parent::Folder(parent.0) };
        let track_metadata = libmtp_rs::storage::files::TrackMetadata::builder(filename, size)
            .artist(metadata.artist.clone())
            .title(metadata.title.clone())
            .album(metadata.album.clone())
            .genre(metadata.genre.clone())
            .date(metadata.year.clone())
            .track_number(metadata.track_number.parse().unwrap_or(0))
            .duration(metadata.duration_ms as u32)
            .build();
        storage
            .send_track_from_descriptor(fd, parent, track_metadata)
            .map(|file| FileId(file.id()))
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn download_to_fd(&self, id: FileId, fd: RawFd) -> Result<(), DeviceError> {
        self.storage_pool()
            .get_file_to_descriptor(ObjectId(id.0), fd)
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn create_playlist(&self, storage: StorageId, name: &str, track_ids: &[FileId]) -> Result<PlaylistId, DeviceError> {
        let ids: Vec<u32> = track_ids.iter().map(|id| id.0).collect();
        self.device
            .create_playlist(storage.0, name, &ids)
            .map(|id| PlaylistId(id))
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn update_playlist(&self, id: PlaylistId, track_ids: &[FileId]) -> Result<(), DeviceError> {
        let ids: Vec<u32> = track_ids.iter().map(|id| id.0).collect();
        self.device
            .update_playlist(id.0, &ids)
            .map_err(|err| DeviceError::new(-1, err.to_string()))
    }

    fn drain_error_stack(&self) {
        for entry in self.device.dump_errorstack() {
            log::warn!("libmtp error stack: {entry}");
        }
        self.device.clear_errorstack();
    }
}
