//! Newtype wrappers around the raw integer object identifiers MTP hands out.
//!
//! libmtp addresses everything — files, folders, storages, playlists — by a
//! bare `u32`. Keeping them as bare integers made it too easy upstream to
//! compare a folder id against a file id by accident; these wrappers exist
//! purely so the type checker catches that.

use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }
    };
}

id_newtype!(FileId);
id_newtype!(FolderId);
id_newtype!(StorageId);
id_newtype!(PlaylistId);

/// The synthetic id of a storage root folder, matching spec.md's "parent_id
/// = 0 means storage root" convention used throughout the folder tree.
pub const ROOT_PARENT: FolderId = FolderId(0);
