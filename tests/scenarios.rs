//! End-to-end scenario tests (spec.md §8 "Concrete scenarios"), driving
//! `FsCore` directly against `FakeDevice` rather than through a real kernel
//! mount — `fuser::Request` has no public constructor, so this is the
//! closest thing to exercising the `Filesystem` trait impl without a live
//! FUSE session. `Filesystem`'s trait methods are a thin translation layer
//! over exactly these calls (see `src/fsops.rs`).

use mtpfs_core::device::fake::FakeDevice;
use mtpfs_core::errors::FsError;
use mtpfs_core::fsops::{EntryKind, FsCore};
use mtpfs_core::ids::FolderId;
use mtpfs_core::inode::ROOT_INO;

fn ino_of(entries: &[(String, EntryKind, u64)], name: &str) -> u64 {
    entries.iter().find(|(n, _, _)| n == name).unwrap_or_else(|| panic!("no entry named {name}")).2
}

#[test]
fn scenario_1_upload_then_list() {
    let device = FakeDevice::new().with_storage("Internal");
    let mut core = FsCore::new(Box::new(device)).unwrap();

    let root = core.do_readdir("/").unwrap();
    let storage_ino = ino_of(&root, "Internal");

    let attr = core.do_mknod(storage_ino, "song.mp3").unwrap();
    let path = core.path_of_ino(attr.ino).unwrap();
    let fh = core.do_open(&path).unwrap();
    let payload = vec![0xFFu8; 1024];
    core.do_write(fh, 0, &payload).unwrap();
    core.do_release(fh).unwrap();

    let internal = core.do_readdir("/Internal").unwrap();
    let song_ino = ino_of(&internal, "song.mp3");
    assert_eq!(internal.iter().find(|(_, k, _)| *k == EntryKind::RegularFile).unwrap().1, EntryKind::RegularFile);
    let song_attr = core.do_getattr(&core.path_of_ino(song_ino).unwrap()).unwrap();
    assert_eq!(song_attr.size, 1024);
}

#[test]
fn scenario_2_lost_and_found_visibility() {
    let device = FakeDevice::new().with_storage("Internal");
    let storage_id = device.storage_id_named("Internal").unwrap();
    device.inject_file(storage_id, FolderId(999), "orphan.mp3", 5);
    let mut core = FsCore::new(Box::new(device)).unwrap();

    let root = core.do_readdir("/").unwrap();
    assert!(root.iter().any(|(n, k, _)| n == "lost+found" && *k == EntryKind::Directory));

    let lost_found = core.do_readdir("/lost+found").unwrap();
    assert!(lost_found.iter().any(|(n, _, _)| n == "orphan.mp3"));
}

#[test]
fn scenario_3_playlist_synthesis() {
    let device = FakeDevice::new().with_storage("Internal");
    let storage_id = device.storage_id_named("Internal").unwrap();
    let folder_a = device.inject_folder(storage_id, FolderId(0), "A");
    let folder_b = device.inject_folder(storage_id, FolderId(0), "B");
    let t1 = device.inject_file(storage_id, folder_a, "1.mp3", 10);
    let t2 = device.inject_file(storage_id, folder_b, "2.mp3", 10);
    device.inject_playlist("Favs", &[t1, t2]);
    let mut core = FsCore::new(Box::new(device)).unwrap();

    let path = "/Playlists/Favs.m3u";
    let attr = core.do_getattr(path).unwrap();
    let fh = core.do_open(path).unwrap();
    let data = core.do_read(fh, 0, attr.size as usize).unwrap();
    core.do_release(fh).unwrap();

    assert_eq!(String::from_utf8(data).unwrap(), "/A/1.mp3\n/B/2.mp3\n");
}

#[test]
fn scenario_4_and_5_empty_folder_rename_then_non_empty_rejected() {
    let device = FakeDevice::new().with_storage("Internal");
    let mut core = FsCore::new(Box::new(device)).unwrap();

    let root = core.do_readdir("/").unwrap();
    let storage_ino = ino_of(&root, "Internal");

    core.do_mkdir(storage_ino, "Old").unwrap();
    let internal = core.do_readdir("/Internal").unwrap();
    assert!(internal.iter().any(|(n, _, _)| n == "Old"));

    core.do_rename(storage_ino, "Old", storage_ino, "New").unwrap();
    let internal = core.do_readdir("/Internal").unwrap();
    assert!(internal.iter().any(|(n, _, _)| n == "New"));
    assert!(!internal.iter().any(|(n, _, _)| n == "Old"));

    let new_ino = ino_of(&internal, "New");
    let mknod_attr = core.do_mknod(new_ino, "x").unwrap();
    let path = core.path_of_ino(mknod_attr.ino).unwrap();
    let fh = core.do_open(&path).unwrap();
    core.do_write(fh, 0, b"hi").unwrap();
    core.do_release(fh).unwrap();

    let err = core.do_rename(storage_ino, "New", storage_ino, "Other").unwrap_err();
    assert!(matches!(err, FsError::NotEmpty));
}

#[test]
fn scenario_6_reserved_trash_prefix() {
    let device = FakeDevice::new().with_storage("Internal");
    let mut core = FsCore::new(Box::new(device)).unwrap();

    let err = core.do_mkdir(ROOT_INO, ".Trash-1000").unwrap_err();
    assert!(matches!(err, FsError::PermissionDenied));
}
