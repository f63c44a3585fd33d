//! Path ⇄ inode translation.
//!
//! spec.md's FSOps contract (§4.7) is expressed entirely in terms of paths,
//! matching the older path-based FUSE low-level API `original_source/mtpfs.c`
//! targets. The `fuser` crate (the idiomatic Rust FUSE binding this crate
//! builds on) instead speaks in inode numbers, so this table is the ambient
//! translation layer a complete `fuser::Filesystem` impl needs — not a new
//! filesystem feature, just the plumbing `lookup`/`getattr`/... require.

use std::collections::HashMap;

pub const ROOT_INO: u64 = 1;

pub struct InodeTable {
    path_by_ino: HashMap<u64, String>,
    ino_by_path: HashMap<String, u64>,
    next_ino: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = InodeTable { path_by_ino: HashMap::new(), ino_by_path: HashMap::new(), next_ino: ROOT_INO + 1 };
        table.path_by_ino.insert(ROOT_INO, "/".to_string());
        table.ino_by_path.insert("/".to_string(), ROOT_INO);
        table
    }

    /// Returns the existing inode for `path`, or allocates a new one.
    pub fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.ino_by_path.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.path_by_ino.insert(ino, path.to_string());
        self.ino_by_path.insert(path.to_string(), ino);
        ino
    }

    pub fn path_of(&self, ino: u64) -> Option<&str> {
        self.path_by_ino.get(&ino).map(|s| s.as_str())
    }

    /// Called from `rename`: the old path's inode now refers to the new path.
    pub fn rename(&mut self, old_path: &str, new_path: &str) {
        if let Some(ino) = self.ino_by_path.remove(old_path) {
            self.path_by_ino.insert(ino, new_path.to_string());
            self.ino_by_path.insert(new_path.to_string(), ino);
        }
    }

    /// Called from `unlink`/`rmdir`: forgets the mapping so a later re-creation
    /// at the same path gets a fresh inode rather than reusing a stale one.
    pub fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.ino_by_path.remove(path) {
            self.path_by_ino.remove(&ino);
        }
    }

    pub fn child_path(parent: &str, name: &str) -> String {
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_gets_same_inode() {
        let mut table = InodeTable::new();
        let a = table.ino_for("/Internal/song.mp3");
        let b = table.ino_for("/Internal/song.mp3");
        assert_eq!(a, b);
        assert_eq!(table.path_of(a), Some("/Internal/song.mp3"));
    }

    #[test]
    fn rename_preserves_inode_under_new_path() {
        let mut table = InodeTable::new();
        let ino = table.ino_for("/Internal/Old");
        table.rename("/Internal/Old", "/Internal/New");
        assert_eq!(table.path_of(ino), Some("/Internal/New"));
        assert_eq!(table.ino_for("/Internal/New"), ino);
    }

    #[test]
    fn child_path_joins_without_double_slash() {
        assert_eq!(InodeTable::child_path("/", "Internal"), "/Internal");
        assert_eq!(InodeTable::child_path("/Internal", "song.mp3"), "/Internal/song.mp3");
    }
}
