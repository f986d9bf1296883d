//! Capabilities consumed by the provisioning workflow
//!
//! The real implementation shells out to system tools (see
//! [`crate::infra::tools`]); tests substitute recording fakes.

use std::io;
use std::path::Path;

/// Result of a filesystem consistency check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// No errors found
    Clean,
    /// Errors found and corrected
    Fixed,
    /// Unrecoverable, or no filesystem at all; carries the exit code if any
    Failed(Option<i32>),
}

impl CheckStatus {
    /// Interpret a checker exit code (`None` when killed by a signal)
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => CheckStatus::Clean,
            Some(1) => CheckStatus::Fixed,
            other => CheckStatus::Failed(other),
        }
    }

    /// Whether the filesystem can be used as is
    pub fn is_usable(self) -> bool {
        matches!(self, CheckStatus::Clean | CheckStatus::Fixed)
    }
}

/// Filesystem level operations on the user data partition
pub trait FilesystemBackend {
    /// Whether the partition device node exists
    fn node_exists(&self, node: &Path) -> bool;

    /// Run a consistency check
    fn check(&self, node: &Path) -> io::Result<CheckStatus>;

    /// Create a fresh filesystem
    fn format(&self, node: &Path) -> io::Result<()>;

    /// Mount `node` on `target`
    fn mount(&self, node: &Path, target: &Path) -> io::Result<()>;

    /// Unmount `target`
    fn unmount(&self, target: &Path) -> io::Result<()>;

    /// Unpack a compressed archive into `target`
    fn extract(&self, archive: &Path, target: &Path) -> io::Result<()>;
}

/// Notifications to the device-event subsystem
///
/// Both are advisory: callers log failures and carry on.
pub trait DeviceEvents {
    /// Wait for pending device events touching `node`
    fn settle(&self, node: &Path) -> io::Result<()>;

    /// Ask the kernel to rescan the partitions of `device`
    fn rescan(&self, device: &Path) -> io::Result<()>;
}
