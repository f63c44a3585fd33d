//! CLI and mount configuration.
//!
//! `MountConfig` is a small `serde`-friendly struct built once at startup
//! and threaded through everything below it (here, into `FsCore`). It is
//! not persisted to disk, since spec.md's non-goals rule out multi-device
//! aggregation and there is nothing else to remember between mounts.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mount an MTP device as a filesystem", long_about = None)]
pub struct Cli {
    /// Where to mount the device
    pub mountpoint: PathBuf,

    /// Friendly name (or serial) of the MTP device to mount; the first
    /// device found is used if omitted.
    #[arg(long)]
    pub device: Option<String>,

    /// Stay attached to the terminal instead of forking to the background.
    #[arg(long)]
    pub foreground: bool,

    /// Allow other users to access the mount (requires `user_allow_other`
    /// in `/etc/fuse.conf`).
    #[arg(long)]
    pub allow_other: bool,

    /// Log verbosity, forwarded to `RUST_LOG` if that's unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the resolved configuration as JSON and exit, without mounting.
    #[arg(long)]
    pub print_config: bool,
}

/// The resolved, immutable configuration for one mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    pub mountpoint: PathBuf,
    pub device: Option<String>,
    pub foreground: bool,
    pub allow_other: bool,
}

impl From<&Cli> for MountConfig {
    fn from(cli: &Cli) -> Self {
        MountConfig {
            mountpoint: cli.mountpoint.clone(),
            device: cli.device.clone(),
            foreground: cli.foreground,
            allow_other: cli.allow_other,
        }
    }
}
