//! FSOps (spec.md §4.7): the top-level operation handlers, serialized by a
//! single device mutex (spec.md §5).
//!
//! Split in two layers: `FsCore` implements every operation in plain Rust,
//! returning `FsResult<_>` and taking/returning paths and plain structs —
//! this is what the scenario tests in `tests/scenarios.rs` drive directly.
//! `Filesystem` is the thin `fuser::Filesystem` adapter on top, translating
//! `Request`/`Reply*` into calls on a `Mutex<FsCore>` and back. `fuser::
//! Request` has no public constructor, so keeping the real logic out of the
//! trait impl is what makes it testable at all without a real kernel mount.

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::{Duration as StdDuration, SystemTime};

use fuser::{
    FileAttr, FileType, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
    ReplyStatfs, ReplyWrite, Request,
};

use crate::cache::ObjectCache;
use crate::device::DeviceSession;
use crate::errors::{FsError, FsResult};
use crate::filetype;
use crate::ids::FolderId;
use crate::inode::{InodeTable, ROOT_INO};
use crate::lost_found;
use crate::path_resolver::{PathResolver, Resolution, ResolvedTarget, VirtualDir};
use crate::playlist_bridge::PlaylistBridge;
use crate::staging::{StagingHandle, StagingStore};
use crate::tag_enricher::TagEnricher;

const TTL: StdDuration = StdDuration::from_secs(1);
const TRASH_PREFIX: &str = "/.Trash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
}

/// A plain, fuser-independent stat result (spec.md §4.7 `getattr`).
#[derive(Debug, Clone)]
pub struct Attr {
    pub ino: u64,
    pub kind: EntryKind,
    pub size: u64,
    pub mtime: SystemTime,
}

pub struct StatfsInfo {
    pub bsize: u32,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
}

struct OpenHandle {
    path: String,
    staging: StagingHandle,
    /// Whether `path` was `Pending` at `open` time — the only thing that
    /// decides `release`'s behavior (spec.md §4.7 `release`).
    was_pending: bool,
}

/// The single owned value every operation runs against (spec.md §9: "model
/// as a single owned Filesystem value... reached through an explicit
/// context handle, not process-wide singletons").
pub struct FsCore {
    cache: ObjectCache,
    device: Box<dyn DeviceSession>,
    pending_paths: BTreeSet<String>,
    inodes: InodeTable,
    handles: HashMap<u64, OpenHandle>,
    next_fh: u64,
}

impl FsCore {
    pub fn new(device: Box<dyn DeviceSession>) -> FsResult<Self> {
        let cache = ObjectCache::new(device.as_ref()).map_err(FsError::Device)?;
        Ok(FsCore { cache, device, pending_paths: BTreeSet::new(), inodes: InodeTable::new(), handles: HashMap::new(), next_fh: 1 })
    }

    pub fn path_of_ino(&self, ino: u64) -> Option<String> {
        self.inodes.path_of(ino).map(|s| s.to_string())
    }

    pub fn child_path(&self, parent_ino: u64, name: &str) -> Option<String> {
        self.inodes.path_of(parent_ino).map(|parent| InodeTable::child_path(parent, name))
    }

    fn resolve(&mut self, path: &str) -> Resolution {
        if let Err(err) = self.refresh_for(path) {
            log::warn!("cache refresh failed for {path}: {err}");
        }
        PathResolver::resolve(&self.cache, &self.pending_paths, path)
    }

    /// Refreshes whichever cache `path` is about to read, per spec.md §4.1
    /// ("refresh_if_dirty check invoked at the start of any operation that
    /// reads that cache").
    fn refresh_for(&mut self, path: &str) -> FsResult<()> {
        self.cache.refresh_files_if_dirty(self.device.as_ref()).map_err(FsError::Device)?;
        self.cache.refresh_playlists_if_dirty(self.device.as_ref()).map_err(FsError::Device)?;
        let _ = path;
        for idx in 0..self.cache.storages().len() {
            self.cache.refresh_folders_if_dirty(self.device.as_ref(), idx).map_err(FsError::Device)?;
        }
        Ok(())
    }

    fn attr_for(&mut self, path: &str, target: &ResolvedTarget) -> Attr {
        let ino = self.inodes.ino_for(path);
        match target {
            ResolvedTarget::Root | ResolvedTarget::VirtualDir(_) | ResolvedTarget::StorageRoot(_) | ResolvedTarget::Folder(_, _) => {
                Attr { ino, kind: EntryKind::Directory, size: 0, mtime: SystemTime::now() }
            }
            ResolvedTarget::File(_, id) | ResolvedTarget::LostFile(id) => {
                let file = self.cache.files().iter().find(|f| f.id == *id);
                let (size, mtime) = file.map(|f| (f.size, system_time_from(f.modified))).unwrap_or((0, SystemTime::now()));
                Attr { ino, kind: EntryKind::RegularFile, size, mtime }
            }
            ResolvedTarget::PlaylistFile(id) => {
                let size = self
                    .cache
                    .playlists()
                    .iter()
                    .find(|p| p.id == *id)
                    .map(|p| PlaylistBridge::rendered_size(&self.cache, self.device.as_ref(), &p.track_ids))
                    .unwrap_or(0);
                Attr { ino, kind: EntryKind::RegularFile, size, mtime: SystemTime::now() }
            }
        }
    }

    pub fn do_getattr(&mut self, path: &str) -> FsResult<Attr> {
        match self.resolve(path) {
            Resolution::Target(target) => Ok(self.attr_for(path, &target)),
            Resolution::Pending => Ok(Attr { ino: self.inodes.ino_for(path), kind: EntryKind::RegularFile, size: 0, mtime: SystemTime::now() }),
            Resolution::NotFound => Err(FsError::NotFound),
        }
    }

    pub fn do_lookup(&mut self, parent_ino: u64, name: &str) -> FsResult<Attr> {
        let path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        self.do_getattr(&path)
    }

    pub fn do_readdir(&mut self, path: &str) -> FsResult<Vec<(String, EntryKind, u64)>> {
        let target = match self.resolve(path) {
            Resolution::Target(target) => target,
            Resolution::Pending => return Err(FsError::InvalidArgument),
            Resolution::NotFound => return Err(FsError::NotFound),
        };

        let entries = match target {
            ResolvedTarget::Root => {
                let mut entries = vec![("Playlists".to_string(), EntryKind::Directory)];
                if lost_found::has_any_lost_file(&self.cache) {
                    entries.push(("lost+found".to_string(), EntryKind::Directory));
                }
                for storage in self.cache.storages() {
                    entries.push((storage.description.clone(), EntryKind::Directory));
                }
                entries
            }
            ResolvedTarget::VirtualDir(VirtualDir::Playlists) => {
                self.cache.playlists().iter().map(|p| (format!("{}.m3u", p.name), EntryKind::RegularFile)).collect()
            }
            ResolvedTarget::VirtualDir(VirtualDir::LostFound) => lost_found::lost_files(&self.cache)
                .map(|f| (f.filename.clone().unwrap_or_else(|| format!("unnamed-{}", f.id)), EntryKind::RegularFile))
                .collect(),
            ResolvedTarget::StorageRoot(idx) => self.children_of(idx, FolderId(0)),
            ResolvedTarget::Folder(idx, id) => self.children_of(idx, id),
            ResolvedTarget::File(_, _) | ResolvedTarget::LostFile(_) | ResolvedTarget::PlaylistFile(_) => return Err(FsError::InvalidArgument),
        };

        Ok(entries
            .into_iter()
            .map(|(name, kind)| {
                let child_path = InodeTable::child_path(path, &name);
                let ino = self.inodes.ino_for(&child_path);
                (name, kind, ino)
            })
            .collect())
    }

    fn children_of(&self, storage_idx: usize, parent: FolderId) -> Vec<(String, EntryKind)> {
        let storage = &self.cache.storages()[storage_idx];
        let mut entries: Vec<(String, EntryKind)> =
            storage.children_of(parent).map(|f| (f.name.clone(), EntryKind::Directory)).collect();
        entries.extend(
            self.cache
                .files()
                .iter()
                .filter(|f| f.storage_id == storage.id && f.parent_id == parent)
                .map(|f| (f.filename.clone().unwrap_or_else(|| format!("unnamed-{}", f.id)), EntryKind::RegularFile)),
        );
        entries
    }

    pub fn do_mknod(&mut self, parent_ino: u64, name: &str) -> FsResult<Attr> {
        let path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        match self.resolve(&path) {
            Resolution::NotFound => {
                self.pending_paths.insert(path.clone());
                Ok(Attr { ino: self.inodes.ino_for(&path), kind: EntryKind::RegularFile, size: 0, mtime: SystemTime::now() })
            }
            _ => Err(FsError::AlreadyExists),
        }
    }

    pub fn do_mkdir(&mut self, parent_ino: u64, name: &str) -> FsResult<Attr> {
        let path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        if path.starts_with(TRASH_PREFIX) {
            return Err(FsError::PermissionDenied);
        }

        let (storage_idx, parent_folder) = match self.resolve(&parent_path(&path)) {
            Resolution::Target(ResolvedTarget::StorageRoot(idx)) => (idx, FolderId(0)),
            Resolution::Target(ResolvedTarget::Folder(idx, id)) => (idx, id),
            _ => return Err(FsError::NotFound),
        };

        if !matches!(self.resolve(&path), Resolution::NotFound) {
            return Err(FsError::AlreadyExists);
        }

        let storage_id = self.cache.storages()[storage_idx].id;
        self.device.create_folder(storage_id, parent_folder, name).map_err(|err| self.fail_device(err))?;
        self.cache.mark_folders_dirty(storage_idx);

        Ok(Attr { ino: self.inodes.ino_for(&path), kind: EntryKind::Directory, size: 0, mtime: SystemTime::now() })
    }

    pub fn do_rmdir(&mut self, parent_ino: u64, name: &str) -> FsResult<()> {
        let path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        match self.resolve(&path) {
            Resolution::Target(ResolvedTarget::Folder(idx, id)) => {
                self.device.delete_object(id.0).map_err(|err| self.fail_device(err))?;
                self.cache.mark_folders_dirty(idx);
                self.inodes.forget_path(&path);
                Ok(())
            }
            _ => Err(FsError::NotFound),
        }
    }

    pub fn do_unlink(&mut self, parent_ino: u64, name: &str) -> FsResult<()> {
        let path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        match self.resolve(&path) {
            Resolution::Target(ResolvedTarget::File(_, id)) | Resolution::Target(ResolvedTarget::LostFile(id)) => {
                self.device.delete_object(id.0).map_err(|err| self.fail_device(err))?;
                self.cache.mark_files_dirty();
                self.inodes.forget_path(&path);
                Ok(())
            }
            Resolution::Target(ResolvedTarget::PlaylistFile(id)) => {
                self.device.delete_object(id.0).map_err(|err| self.fail_device(err))?;
                self.cache.mark_playlists_dirty();
                self.inodes.forget_path(&path);
                Ok(())
            }
            // "unlink while Pending/Open is not defined and returns -ENOENT" (spec.md §4.7 state machine).
            _ => Err(FsError::NotFound),
        }
    }

    pub fn do_rename(&mut self, parent_ino: u64, name: &str, new_parent_ino: u64, new_name: &str) -> FsResult<()> {
        let old_path = self.child_path(parent_ino, name).ok_or(FsError::NotFound)?;
        let new_path = self.child_path(new_parent_ino, new_name).ok_or(FsError::NotFound)?;

        let (old_idx, old_id) = match self.resolve(&old_path) {
            Resolution::Target(ResolvedTarget::Folder(idx, id)) => (idx, id),
            Resolution::NotFound | Resolution::Pending => return Err(FsError::NotFound),
            // "Non-empty folder or any file rename → -ENOTEMPTY" (spec.md §4.7).
            _ => return Err(FsError::NotEmpty),
        };

        let storage = &self.cache.storages()[old_idx];
        let has_child_folder = storage.children_of(old_id).next().is_some();
        let has_child_file = self.cache.files().iter().any(|f| f.storage_id == storage.id && f.parent_id == old_id);
        if has_child_folder || has_child_file {
            return Err(FsError::NotEmpty);
        }

        let (new_idx, new_parent_folder) = match self.resolve(&parent_path(&new_path)) {
            Resolution::Target(ResolvedTarget::StorageRoot(idx)) => (idx, FolderId(0)),
            Resolution::Target(ResolvedTarget::Folder(idx, id)) => (idx, id),
            _ => return Err(FsError::NotFound),
        };

        if !matches!(self.resolve(&new_path), Resolution::NotFound) {
            return Err(FsError::AlreadyExists);
        }

        let new_storage_id = self.cache.storages()[new_idx].id;
        self.device.create_folder(new_storage_id, new_parent_folder, new_name).map_err(|err| self.fail_device(err))?;
        self.device.delete_object(old_id.0).map_err(|err| self.fail_device(err))?;

        self.cache.mark_folders_dirty(old_idx);
        self.cache.mark_folders_dirty(new_idx);
        self.inodes.rename(&old_path, &new_path);
        Ok(())
    }

    pub fn do_open(&mut self, path: &str) -> FsResult<u64> {
        let resolution = self.resolve(path);
        let (staging, was_pending) = match resolution {
            Resolution::Pending => (StagingStore::attach_new()?, true),
            Resolution::Target(ResolvedTarget::File(_, id)) | Resolution::Target(ResolvedTarget::LostFile(id)) => {
                (StagingStore::attach_download(self.device.as_ref(), id)?, false)
            }
            Resolution::Target(ResolvedTarget::PlaylistFile(id)) => {
                let track_ids = self
                    .cache
                    .playlists()
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.track_ids.clone())
                    .unwrap_or_default();
                let body = PlaylistBridge::render(&self.cache, self.device.as_ref(), &track_ids);
                let mut staging = StagingStore::attach_new()?;
                staging.write_all(body.as_bytes())?;
                (staging, false)
            }
            _ => return Err(FsError::NotFound),
        };

        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(fh, OpenHandle { path: path.to_string(), staging, was_pending });
        Ok(fh)
    }

    pub fn do_read(&mut self, fh: u64, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        let handle = self.handles.get_mut(&fh).ok_or(FsError::InvalidArgument)?;
        Ok(handle.staging.pread(offset, size)?)
    }

    pub fn do_write(&mut self, fh: u64, offset: u64, data: &[u8]) -> FsResult<u32> {
        let handle = self.handles.get_mut(&fh).ok_or(FsError::InvalidArgument)?;
        Ok(handle.staging.pwrite(offset, data)? as u32)
    }

    pub fn do_fsync(&mut self, fh: u64) -> FsResult<()> {
        let handle = self.handles.get_mut(&fh).ok_or(FsError::InvalidArgument)?;
        Ok(handle.staging.flush()?)
    }

    pub fn do_release(&mut self, fh: u64) -> FsResult<()> {
        let Some(mut handle) = self.handles.remove(&fh) else {
            return Ok(());
        };

        if !handle.was_pending {
            return Ok(());
        }
        self.pending_paths.remove(&handle.path);

        if let Some(rest) = handle.path.strip_prefix("/Playlists/") {
            self.commit_playlist(rest, &mut handle.staging)
        } else {
            self.commit_upload(&handle.path, &mut handle.staging)
        }
    }

    fn commit_playlist(&mut self, rest: &str, staging: &mut StagingHandle) -> FsResult<()> {
        let name = rest.strip_suffix(".m3u").unwrap_or(rest);
        let body = staging.read_to_string()?;
        let track_ids = PlaylistBridge::parse(&self.cache, &body);

        let existing = self.cache.playlists().iter().find(|p| p.name.eq_ignore_ascii_case(name)).map(|p| p.id);
        match existing {
            Some(id) => self.device.update_playlist(id, &track_ids).map_err(|err| self.fail_device(err))?,
            None => {
                let storage_id = self.cache.storages().first().ok_or(FsError::InvalidArgument)?.id;
                self.device.create_playlist(storage_id, name, &track_ids).map_err(|err| self.fail_device(err))?;
            }
        }
        self.cache.mark_playlists_dirty();
        Ok(())
    }

    fn commit_upload(&mut self, path: &str, staging: &mut StagingHandle) -> FsResult<()> {
        let (parent, filename) = (parent_path(path), last_component(path));
        let (storage_idx, parent_folder) = match self.resolve(&parent) {
            Resolution::Target(ResolvedTarget::StorageRoot(idx)) => (idx, FolderId(0)),
            Resolution::Target(ResolvedTarget::Folder(idx, id)) => (idx, id),
            // Open Question 5 (SPEC_FULL.md §9): parent missing on device → fail rather
            // than silently filing the upload at the storage root.
            _ => return Err(FsError::NotFound),
        };

        let storage_id = self.cache.storages()[storage_idx].id;
        let size = staging.len()?;
        let fd = staging.raw_fd();

        if TagEnricher::applies_to(filename) {
            let metadata = TagEnricher::enrich(staging.file_mut(), size);
            self.device.upload_track(fd, size, storage_id, parent_folder, filename, &metadata).map_err(|err| self.fail_device(err))?;
        } else {
            let kind = filetype::from_extension(filetype::extension_of(filename));
            self.device.upload_file(fd, size, storage_id, parent_folder, filename, kind).map_err(|err| self.fail_device(err))?;
        }
        self.cache.mark_files_dirty();
        Ok(())
    }

    pub fn do_statfs(&mut self) -> FsResult<StatfsInfo> {
        let storage = self.cache.storages().first().ok_or(FsError::NotFound)?;
        Ok(StatfsInfo {
            bsize: 1024,
            blocks: storage.max_capacity / 1024,
            bfree: storage.free_bytes / 1024,
            bavail: storage.free_bytes / 1024,
            files: storage.free_objects / 1024,
            ffree: storage.free_objects / 1024,
        })
    }

    fn fail_device(&self, err: crate::errors::DeviceError) -> FsError {
        self.device.drain_error_stack();
        FsError::Device(err)
    }
}

fn parent_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _name)) => "/".to_string(),
        Some((parent, _name)) => parent.to_string(),
        None => "/".to_string(),
    }
}

fn last_component(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn system_time_from(dt: time::OffsetDateTime) -> SystemTime {
    let unix = dt.unix_timestamp();
    if unix >= 0 {
        SystemTime::UNIX_EPOCH + StdDuration::from_secs(unix as u64)
    } else {
        SystemTime::UNIX_EPOCH - StdDuration::from_secs((-unix) as u64)
    }
}

fn to_file_attr(attr: &Attr, uid: u32, gid: u32) -> FileAttr {
    let (kind, perm, nlink) = match attr.kind {
        EntryKind::Directory => (FileType::Directory, 0o777, 2),
        EntryKind::RegularFile => (FileType::RegularFile, 0o666, 1),
    };
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: (attr.size + 511) / 512,
        atime: attr.mtime,
        mtime: attr.mtime,
        ctime: attr.mtime,
        crtime: attr.mtime,
        kind,
        perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

fn errno_reply(err: &FsError) -> i32 {
    err.to_errno()
}

/// The `fuser::Filesystem` adapter: locks `FsCore` for the duration of every
/// call (spec.md §5 "all public operations hold the device mutex for their
/// entire duration") and translates the result into a `Reply*`.
pub struct Filesystem {
    core: Mutex<FsCore>,
}

impl Filesystem {
    pub fn new(core: FsCore) -> Self {
        Filesystem { core: Mutex::new(core) }
    }
}

impl fuser::Filesystem for Filesystem {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), std::ffi::c_int> {
        Ok(())
    }

    fn destroy(&mut self) {
        let core = self.core.lock().unwrap();
        core.device.drain_error_stack();
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let mut core = self.core.lock().unwrap();
        match core.do_lookup(parent, &name.to_string_lossy()) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr, req.uid(), req.gid()), 0),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let mut core = self.core.lock().unwrap();
        let Some(path) = core.path_of_ino(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match core.do_getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(&attr, req.uid(), req.gid())),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // chmod (and every other attribute change) is accepted and ignored (spec.md §6).
        self.getattr(req, ino, None, reply);
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let mut core = self.core.lock().unwrap();
        let Some(path) = core.path_of_ino(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match core.do_readdir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(errno_reply(&err));
                return;
            }
        };

        let mut all = vec![(".".to_string(), FileType::Directory, ino), ("..".to_string(), FileType::Directory, ino)];
        all.extend(entries.into_iter().map(|(name, kind, child_ino)| {
            let kind = match kind {
                EntryKind::Directory => FileType::Directory,
                EntryKind::RegularFile => FileType::RegularFile,
            };
            (name, kind, child_ino)
        }));

        for (i, (name, kind, child_ino)) in all.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn mknod(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, _rdev: u32, reply: ReplyEntry) {
        let mut core = self.core.lock().unwrap();
        match core.do_mknod(parent, &name.to_string_lossy()) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr, req.uid(), req.gid()), 0),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn mkdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        let mut core = self.core.lock().unwrap();
        match core.do_mkdir(parent, &name.to_string_lossy()) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr, req.uid(), req.gid()), 0),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut core = self.core.lock().unwrap();
        match core.do_rmdir(parent, &name.to_string_lossy()) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut core = self.core.lock().unwrap();
        match core.do_unlink(parent, &name.to_string_lossy()) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn rename(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, newparent: u64, newname: &OsStr, _flags: u32, reply: ReplyEmpty) {
        let mut core = self.core.lock().unwrap();
        match core.do_rename(parent, &name.to_string_lossy(), newparent, &newname.to_string_lossy()) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let mut core = self.core.lock().unwrap();
        let Some(path) = core.path_of_ino(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match core.do_open(&path) {
            Ok(fh) => reply.opened(fh, 0),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, offset: i64, size: u32, _flags: i32, _lock_owner: Option<u64>, reply: ReplyData) {
        let mut core = self.core.lock().unwrap();
        match core.do_read(fh, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let mut core = self.core.lock().unwrap();
        match core.do_write(fh, offset.max(0) as u64, data) {
            Ok(written) => reply.written(written),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        // Staging is fsync'd in `release`, not here (SPEC_FULL.md §4.7).
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _datasync: bool, reply: ReplyEmpty) {
        let mut core = self.core.lock().unwrap();
        match core.do_fsync(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn release(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, _lock_owner: Option<u64>, _flush: bool, reply: ReplyEmpty) {
        let mut core = self.core.lock().unwrap();
        match core.do_release(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let mut core = self.core.lock().unwrap();
        match core.do_statfs() {
            Ok(info) => reply.statfs(info.blocks, info.bfree, info.bavail, info.files, info.ffree, info.bsize, 255, info.bsize),
            Err(err) => reply.error(errno_reply(&err)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, _ino: u64, _mask: i32, reply: ReplyEmpty) {
        // The device has no POSIX permission concept (spec.md §4.7 getattr: "rwx for all").
        reply.ok();
    }
}
