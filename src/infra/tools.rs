//! System tools
//!
//! [`SystemTools`] backs the filesystem and device-event traits with the
//! usual Linux utilities (`e2fsck`, `mke2fs`, `tar`, `udevadm`, `partprobe`)
//! and with `mount(2)`/`umount(2)` through `nix`. Tools are looked up on
//! `PATH` first so a missing one is reported by name.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

use nix::mount::{mount, umount, MsFlags};

use crate::config::defaults;
use crate::core::backend::{CheckStatus, DeviceEvents, FilesystemBackend};

/// Run `program` with `args`, returning its exit status
pub fn run_tool<S: AsRef<OsStr>>(program: &str, args: &[S]) -> io::Result<ExitStatus> {
    let exe = which::which(program).map_err(|e| {
        io::Error::new(io::ErrorKind::NotFound, format!("{program} not found: {e}"))
    })?;

    tracing::debug!(
        "Running {} {}",
        exe.display(),
        args.iter()
            .map(|a| a.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    Command::new(exe).args(args).status()
}

/// Run `program` and fail unless it exits successfully
pub fn run_tool_checked<S: AsRef<OsStr>>(program: &str, args: &[S]) -> io::Result<()> {
    let status = run_tool(program, args)?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}

/// Real system backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

impl SystemTools {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

impl FilesystemBackend for SystemTools {
    fn node_exists(&self, node: &Path) -> bool {
        node.exists()
    }

    fn check(&self, node: &Path) -> io::Result<CheckStatus> {
        let status = run_tool("e2fsck", &[OsStr::new("-p"), node.as_os_str()])?;
        Ok(CheckStatus::from_exit_code(status.code()))
    }

    fn format(&self, node: &Path) -> io::Result<()> {
        run_tool_checked(
            "mke2fs",
            &[
                OsStr::new("-t"),
                OsStr::new(defaults::FILESYSTEM_TYPE),
                OsStr::new("-F"),
                node.as_os_str(),
            ],
        )
    }

    fn mount(&self, node: &Path, target: &Path) -> io::Result<()> {
        mount(
            Some(node),
            target,
            Some(defaults::FILESYSTEM_TYPE),
            MsFlags::MS_NOATIME,
            None::<&str>,
        )
        .map_err(io::Error::from)
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        umount(target).map_err(io::Error::from)
    }

    fn extract(&self, archive: &Path, target: &Path) -> io::Result<()> {
        run_tool_checked(
            "tar",
            &[
                OsStr::new("x"),
                OsStr::new("-z"),
                OsStr::new("-f"),
                archive.as_os_str(),
                OsStr::new("-C"),
                target.as_os_str(),
            ],
        )
    }
}

impl DeviceEvents for SystemTools {
    fn settle(&self, node: &Path) -> io::Result<()> {
        let exit_if_exists = format!("--exit-if-exists={}", node.display());
        run_tool_checked("udevadm", &["settle", exit_if_exists.as_str()])
    }

    fn rescan(&self, device: &Path) -> io::Result<()> {
        run_tool_checked("partprobe", &[device.as_os_str()])
    }
}
