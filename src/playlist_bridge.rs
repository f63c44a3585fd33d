//! `PlaylistBridge` (spec.md §4.5): synthesizes a `<name>.m3u` text file per
//! MTP playlist and parses edits back into an ordered track list on write.
//!
//! Uses the `m3u` crate for playlist framing, generalized from "parse only"
//! to round-tripping both directions.

use crate::cache::ObjectCache;
use crate::device::DeviceSession;
use crate::ids::FileId;
use crate::path_resolver::{PathResolver, Resolution, ResolvedTarget};

pub struct PlaylistBridge;

impl PlaylistBridge {
    /// Reconstructs a playlist's `.m3u` body: one reconstructed path per
    /// track, LF-terminated, root-relative and omitting the storage
    /// component (spec.md §4.5, §6 — an acknowledged lossy mapping on
    /// multi-storage devices, see `SPEC_FULL.md` §9 Open Question 3).
    pub fn render(cache: &ObjectCache, device: &dyn DeviceSession, track_ids: &[FileId]) -> String {
        let mut body = String::new();
        for &track_id in track_ids {
            if let Some(path) = Self::reconstruct_path(cache, device, track_id) {
                body.push_str(&path);
                body.push('\n');
            }
            // A track id whose file record is neither cached nor still on the
            // device is silently skipped — the cache may be stale (spec.md
            // §6: "deletions may succeed partially").
        }
        body
    }

    /// The byte length `getattr` should report for a playlist file, computed
    /// with the same reconstruction logic used for `open`/`read` (spec.md
    /// §4.5 "Size reporting").
    pub fn rendered_size(cache: &ObjectCache, device: &dyn DeviceSession, track_ids: &[FileId]) -> u64 {
        Self::render(cache, device, track_ids).len() as u64
    }

    /// Looks the track up in the cache first; on a cache miss, falls back to
    /// a direct `file_metadata` query, since the object may simply not have
    /// been refreshed into the cache yet rather than actually be gone.
    fn reconstruct_path(cache: &ObjectCache, device: &dyn DeviceSession, track_id: FileId) -> Option<String> {
        let file = match cache.files().iter().find(|f| f.id == track_id) {
            Some(file) => file.clone(),
            None => device.file_metadata(track_id).ok()?,
        };
        let storage_idx = cache.storages().iter().position(|s| s.id == file.storage_id)?;
        let storage = &cache.storages()[storage_idx];
        let mut components = storage.path_components(file.parent_id);
        components.push(file.filename.clone().unwrap_or_default());
        Some(format!("/{}", components.join("/")))
    }

    /// Parses an `.m3u` body written by a client, resolving each line to a
    /// track id via `PathResolver`. Lines that don't resolve are silently
    /// skipped (spec.md §4.5 "Writing").
    pub fn parse(cache: &ObjectCache, body: &str) -> Vec<FileId> {
        use std::collections::BTreeSet;
        use std::io::BufReader;

        let empty_pending: BTreeSet<String> = BTreeSet::new();
        let mut reader = m3u::EntryReader::new(BufReader::new(body.as_bytes()));

        reader
            .entries()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| match entry {
                m3u::Entry::Url(_) => None,
                m3u::Entry::Path(p) => Some(p),
            })
            .filter_map(|path| {
                let path = Self::as_absolute_path(cache, &path.to_string_lossy())?;
                match PathResolver::resolve(cache, &empty_pending, &path) {
                    Resolution::Target(ResolvedTarget::File(_, id)) => Some(id),
                    _ => None,
                }
            })
            .collect()
    }

    /// A reconstructed playlist line omits the storage component (spec.md
    /// §4.5), so to resolve it back we have to try each storage in turn.
    fn as_absolute_path(cache: &ObjectCache, line: &str) -> Option<String> {
        if !line.starts_with('/') {
            return None;
        }
        cache.storages().iter().find_map(|storage| {
            let candidate = format!("/{}{}", storage.description, line);
            let empty_pending = std::collections::BTreeSet::new();
            match PathResolver::resolve(cache, &empty_pending, &candidate) {
                Resolution::Target(ResolvedTarget::File(_, _)) => Some(candidate),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeDevice;
    use crate::ids::FolderId;

    #[test]
    fn render_reconstructs_paths_omitting_storage() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;

        let folder_a = device.inject_folder(storage_id, FolderId(0), "A");
        let folder_b = device.inject_folder(storage_id, FolderId(0), "B");
        let t1 = device.inject_file(storage_id, folder_a, "1.mp3", 10);
        let t2 = device.inject_file(storage_id, folder_b, "2.mp3", 10);

        cache.mark_all_folders_dirty();
        cache.mark_files_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();

        let rendered = PlaylistBridge::render(&cache, &device, &[t1, t2]);
        assert_eq!(rendered, "/A/1.mp3\n/B/2.mp3\n");
    }

    #[test]
    fn parse_resolves_lines_back_to_track_ids() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        let folder_a = device.inject_folder(storage_id, FolderId(0), "A");
        let t1 = device.inject_file(storage_id, folder_a, "1.mp3", 10);

        cache.mark_all_folders_dirty();
        cache.mark_files_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();

        let ids = PlaylistBridge::parse(&cache, "/A/1.mp3\n/does/not/exist.mp3\n");
        assert_eq!(ids, vec![t1]);
    }

    #[test]
    fn write_read_round_trip_preserves_n_lines() {
        let device = FakeDevice::new().with_storage("Internal");
        let mut cache = ObjectCache::new(&device).unwrap();
        let storage_id = cache.storages()[0].id;
        let folder_a = device.inject_folder(storage_id, FolderId(0), "A");
        let t1 = device.inject_file(storage_id, folder_a, "1.mp3", 10);
        let t2 = device.inject_file(storage_id, folder_a, "2.mp3", 10);

        cache.mark_all_folders_dirty();
        cache.mark_files_dirty();
        cache.refresh_folders_if_dirty(&device, 0).unwrap();
        cache.refresh_files_if_dirty(&device).unwrap();

        let rendered = PlaylistBridge::render(&cache, &device, &[t1, t2]);
        let parsed = PlaylistBridge::parse(&cache, &rendered);
        assert_eq!(parsed, vec![t1, t2]);
    }
}
