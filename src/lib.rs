pub mod cache;
pub mod config;
pub mod device;
pub mod errors;
pub mod filetype;
pub mod fsops;
pub mod ids;
pub mod inode;
pub mod lost_found;
pub mod path_resolver;
pub mod playlist_bridge;
pub mod staging;
pub mod tag_enricher;

pub use fsops::{FsCore, Filesystem};
