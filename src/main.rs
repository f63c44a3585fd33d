use std::process::ExitCode;

use clap::Parser;
use mtpfs_core::config::{Cli, MountConfig};
use mtpfs_core::device::backend::LibmtpSession;
use mtpfs_core::{Filesystem, FsCore};

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::init_from_env(env_logger::Env::default().filter_or("RUST_LOG", &cli.log_level));

    let config = MountConfig::from(&cli);
    if cli.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(err) => log::error!("failed to render config: {err}"),
        }
        return ExitCode::SUCCESS;
    }

    if let Err(err) = run(&config) {
        eprintln!("mtpfs-rs: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(config: &MountConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.foreground {
        log::warn!("daemonizing is not supported by this build; staying attached to the terminal");
    }

    log::info!("opening MTP device{}", config.device.as_deref().map(|d| format!(" {d}")).unwrap_or_default());
    let device = LibmtpSession::open(config.device.as_deref())?;
    let core = FsCore::new(Box::new(device))?;
    let filesystem = Filesystem::new(core);

    let mut options = vec![fuser::MountOption::FSName("mtpfs-rs".to_string()), fuser::MountOption::AutoUnmount];
    if config.allow_other {
        options.push(fuser::MountOption::AllowOther);
    }

    log::info!("mounting at {}", config.mountpoint.display());
    fuser::mount2(filesystem, &config.mountpoint, &options)?;
    Ok(())
}
