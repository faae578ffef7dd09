//! Mount command.

use std::path::PathBuf;

use oerpfs_config::MountConfig;
#[cfg(unix)]
use oerpfs_fuse::OerpFs;

/// Mount arguments.
pub struct MountArgs {
    /// Mount point path.
    pub mountpoint: PathBuf,
    /// Allow users other than the mounting one.
    pub allow_other: bool,
}

/// Run the mount command. Blocks until the filesystem is unmounted.
#[cfg(unix)]
pub fn run(config: MountConfig, args: MountArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.mountpoint.exists() {
        std::fs::create_dir_all(&args.mountpoint)?;
    }

    let fs = OerpFs::from_config(config)?;
    fs.mount(&args.mountpoint, args.allow_other)?;

    Ok(())
}

#[cfg(not(unix))]
pub fn run(_config: MountConfig, _args: MountArgs) -> Result<(), Box<dyn std::error::Error>> {
    Err("mounting needs FUSE, which is only available on Unix".into())
}
