//! `PathResolver` (spec.md §4.2): maps a POSIX path to a device object, or to
//! one of the virtual namespace entries, splitting the `/Playlists` and
//! `/lost+found` prefixes from the physical per-storage roots.
//!
//! Grounded in spec.md §9's instruction to "replace the C idiom of
//! returning `int` with overloaded sentinels... with a sum type" — hence
//! `ResolvedTarget` and `LookupResult` below are plain enums, not `i32`.

use std::collections::BTreeSet;

use crate::cache::ObjectCache;
use crate::ids::{FileId, FolderId, PlaylistId};
use crate::lost_found;

pub const PLAYLISTS_DIR: &str = "Playlists";
pub const LOST_FOUND_DIR: &str = "lost+found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualDir {
    Playlists,
    LostFound,
}

/// What a path resolves to, once it is known not to be `Pending` and not
/// `NotFound` (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Root,
    VirtualDir(VirtualDir),
    StorageRoot(usize),
    Folder(usize, FolderId),
    File(usize, FileId),
    PlaylistFile(PlaylistId),
    LostFile(FileId),
}

/// The full result of `resolve`, including the two cases that are not a
/// concrete object (spec.md §4.2: "`resolve(path) → ResolvedTarget | NotFound
/// | Pending`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Target(ResolvedTarget),
    Pending,
    NotFound,
}

/// Internal sentinel for `lookup_folder_id`'s DFS: spec.md §4.2 calls the
/// "-2 means storage root itself" case out explicitly as something a sum
/// type should replace.
enum LookupResult {
    Folder(FolderId),
    StorageRootItself,
    NotFound,
}

pub struct PathResolver;

impl PathResolver {
    /// Resolves `path` against `cache` and the currently pending uploads.
    pub fn resolve(cache: &ObjectCache, pending_paths: &BTreeSet<String>, path: &str) -> Resolution {
        if path == "/" {
            return Resolution::Target(ResolvedTarget::Root);
        }

        if pending_paths.contains(path) {
            return Resolution::Pending;
        }

        if let Some(rest) = strip_prefix_dir(path, PLAYLISTS_DIR) {
            return Self::resolve_playlists(cache, rest);
        }

        if let Some(rest) = strip_prefix_dir(path, LOST_FOUND_DIR) {
            return Self::resolve_lost_found(cache, rest);
        }

        Self::resolve_storage_path(cache, path)
    }

    fn resolve_playlists(cache: &ObjectCache, rest: Option<&str>) -> Resolution {
        match rest {
            None => Resolution::Target(ResolvedTarget::VirtualDir(VirtualDir::Playlists)),
            Some(name) => match name.strip_suffix(".m3u") {
                Some(stem) => match cache.playlist_by_name(stem) {
                    Some(playlist) => Resolution::Target(ResolvedTarget::PlaylistFile(playlist.id)),
                    None => Resolution::NotFound,
                },
                None => Resolution::NotFound,
            },
        }
    }

    fn resolve_lost_found(cache: &ObjectCache, rest: Option<&str>) -> Resolution {
        match rest {
            None => Resolution::Target(ResolvedTarget::VirtualDir(VirtualDir::LostFound)),
            Some(filename) => match lost_found::find_by_filename(cache, filename) {
                Some(file) => Resolution::Target(ResolvedTarget::LostFile(file.id)),
                None => Resolution::NotFound,
            },
        }
    }

    fn resolve_storage_path(cache: &ObjectCache, path: &str) -> Resolution {
        let components: Vec<&str> = path.trim_start_matches('/').split('/').filter(|c| !c.is_empty()).collect();
        let Some((&storage_name, rest)) = components.split_first() else {
            return Resolution::NotFound;
        };

        let Some(storage_idx) = find_storage(cache, storage_name) else {
            return Resolution::NotFound;
        };

        match lookup_folder_id(cache, storage_idx, rest) {
            LookupResult::StorageRootItself => Resolution::Target(ResolvedTarget::StorageRoot(storage_idx)),
            LookupResult::Folder(id) => Resolution::Target(ResolvedTarget::Folder(storage_idx, id)),
            LookupResult::NotFound => {
                // Not a folder path; maybe the terminal component is a file
                // under the resolved parent (spec.md §4.2: "If no folder
                // matches but the terminal component matches a file...").
                match resolve_file_in_parent(cache, storage_idx, rest) {
                    Some(file_id) => Resolution::Target(ResolvedTarget::File(storage_idx, file_id)),
                    None => Resolution::NotFound,
                }
            }
        }
    }
}

/// Finds the storage whose description matches `name`.
///
/// spec.md §9 flags the original's length-clamped prefix comparison as
/// ambiguous when one storage's name is a prefix of another's; this
/// implementation instead compares full strings, treating prefix collisions
/// as simply "no match" (see `SPEC_FULL.md` §9, Open Question 1).
fn find_storage(cache: &ObjectCache, name: &str) -> Option<usize> {
    cache.storage_index_by_description(name)
}

/// DFS over a storage's folder tree, matching each path component against a
/// folder name case-insensitively (spec.md §4.2). First match by DFS order
/// wins.
fn lookup_folder_id(cache: &ObjectCache, storage_idx: usize, relpath: &[&str]) -> LookupResult {
    let storage = &cache.storages()[storage_idx];
    if relpath.is_empty() {
        return LookupResult::StorageRootItself;
    }

    let mut candidates: Vec<FolderId> = storage.roots().to_vec();

    for (i, component) in relpath.iter().enumerate() {
        let found = candidates
            .iter()
            .copied()
            .find(|&id| storage.folder(id).map(|f| f.name.eq_ignore_ascii_case(component)).unwrap_or(false));

        match found {
            Some(id) => {
                if i == relpath.len() - 1 {
                    return LookupResult::Folder(id);
                }
                candidates = storage.children_of(id).map(|f| f.id).collect();
            }
            None => return LookupResult::NotFound,
        }
    }

    LookupResult::NotFound
}

fn resolve_file_in_parent(cache: &ObjectCache, storage_idx: usize, relpath: &[&str]) -> Option<FileId> {
    let (&filename, dirs) = relpath.split_last()?;
    let storage = &cache.storages()[storage_idx];
    let storage_id = storage.id;

    let parent_id = if dirs.is_empty() {
        FolderId(0)
    } else {
        match lookup_folder_id(cache, storage_idx, dirs) {
            LookupResult::Folder(id) => id,
            LookupResult::StorageRootItself => FolderId(0),
            LookupResult::NotFound => return None,
        }
    };

    cache
        .files()
        .iter()
        .find(|f| f.storage_id == storage_id && f.parent_id == parent_id && f.filename.as_deref().map(|n| n.eq_ignore_ascii_case(filename)).unwrap_or(false))
        .map(|f| f.id)
}

/// Splits the `/<dir>` or `/<dir>/<rest>` prefix off `path`, returning
/// `None` if `path` doesn't start with `/<dir>` at all, or
/// `Some(None)` for the bare `/<dir>` directory itself, or
/// `Some(Some(rest))` for `/<dir>/<rest>` (where `rest` may itself contain
/// `/`, though the virtual namespaces are flat in practice).
fn strip_prefix_dir<'a>(path: &'a str, dir: &str) -> Option<Option<&'a str>> {
    let prefix = format!("/{dir}");
    if path == prefix {
        return Some(None);
    }
    path.strip_prefix(&prefix).and_then(|rest| rest.strip_prefix('/')).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeDevice;

    fn pending() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn root_resolves() {
        let device = FakeDevice::new();
        let cache = ObjectCache::new(&device).unwrap();
        assert_eq!(PathResolver::resolve(&cache, &pending(), "/"), Resolution::Target(ResolvedTarget::Root));
    }

    #[test]
    fn pending_path_takes_priority() {
        let device = FakeDevice::new().with_storage("Internal");
        let cache = ObjectCache::new(&device).unwrap();
        let mut pend = pending();
        pend.insert("/Internal/new.mp3".to_string());
        assert_eq!(PathResolver::resolve(&cache, &pend, "/Internal/new.mp3"), Resolution::Pending);
    }

    #[test]
    fn storage_root_and_nested_folder() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        let sub = device.inject_folder(storage_id, FolderId(0), "Music");
        cache.mark_all_folders_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();

        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/Internal"),
            Resolution::Target(ResolvedTarget::StorageRoot(0))
        );
        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/Internal/music"),
            Resolution::Target(ResolvedTarget::Folder(0, sub))
        );
    }

    #[test]
    fn file_under_folder_resolves_case_insensitively() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        let sub = device.inject_folder(storage_id, FolderId(0), "A");
        let file_id = device.inject_file(storage_id, sub, "1.mp3", 1024);
        cache.mark_all_folders_dirty();
        cache.mark_files_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();

        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/Internal/A/1.MP3"),
            Resolution::Target(ResolvedTarget::File(0, file_id))
        );
    }

    #[test]
    fn unknown_path_is_not_found() {
        let device = FakeDevice::new().with_storage("Internal");
        let cache = ObjectCache::new(&device).unwrap();
        assert_eq!(PathResolver::resolve(&cache, &pending(), "/Internal/missing"), Resolution::NotFound);
        assert_eq!(PathResolver::resolve(&cache, &pending(), "/NoSuchStorage"), Resolution::NotFound);
    }

    #[test]
    fn playlists_virtual_dir_and_file() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let pl_id = device.inject_playlist("Favs", &[]);
        cache.mark_playlists_dirty();
        cache.refresh_playlists_if_dirty(&device).unwrap();

        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/Playlists"),
            Resolution::Target(ResolvedTarget::VirtualDir(VirtualDir::Playlists))
        );
        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/Playlists/favs.m3u"),
            Resolution::Target(ResolvedTarget::PlaylistFile(pl_id))
        );
        assert_eq!(PathResolver::resolve(&cache, &pending(), "/Playlists/nope.m3u"), Resolution::NotFound);
    }

    #[test]
    fn lost_found_virtual_dir_and_file() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        device.inject_file(storage_id, FolderId(999), "orphan.mp3", 5);
        cache.mark_files_dirty();
        cache.refresh_files_if_dirty(&device).unwrap();

        assert_eq!(
            PathResolver::resolve(&cache, &pending(), "/lost+found"),
            Resolution::Target(ResolvedTarget::VirtualDir(VirtualDir::LostFound))
        );
        matches!(
            PathResolver::resolve(&cache, &pending(), "/lost+found/orphan.mp3"),
            Resolution::Target(ResolvedTarget::LostFile(_))
        );
    }
}
