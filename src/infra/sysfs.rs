//! Sysfs block device attributes
//!
//! Reads the handful of `/sys/class/block/<name>` attributes needed to
//! identify a disk: model, sector size, size and I/O hints. The root is
//! configurable so tests can point it at a fake tree.

use std::env;
use std::fs;
use std::path::PathBuf;

use crate::config::defaults;

/// A sysfs mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Sysfs {
    /// Sysfs rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sysfs root from `USERDATA_INIT_SYSFS`, else `/sys`
    pub fn from_env() -> Self {
        let root = env::var_os(defaults::ENV_SYSFS_ROOT)
            .map_or_else(|| PathBuf::from(defaults::SYSFS_ROOT), PathBuf::from);
        Self::new(root)
    }

    /// Attributes of the block device (or partition) called `name`
    pub fn block(&self, name: &str) -> BlockAttrs {
        BlockAttrs {
            dir: self.root.join("class").join("block").join(name),
        }
    }
}

/// Attribute directory of one block device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAttrs {
    dir: PathBuf,
}

impl BlockAttrs {
    /// Trimmed attribute value; `None` if unreadable or blank
    pub fn attr(&self, relative: &str) -> Option<String> {
        let value = fs::read_to_string(self.dir.join(relative)).ok()?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn number(&self, relative: &str) -> Option<u64> {
        self.attr(relative)?.parse().ok()
    }

    /// Hardware model string
    ///
    /// MMC and SD cards report `"<type> <name>"` (e.g. `MMC 4FTE4R`), SCSI
    /// style devices `"<vendor> <model>"`.
    pub fn model(&self) -> Option<String> {
        if let Some(kind) = self.attr("device/type") {
            if kind == "MMC" || kind == "SD" {
                let name = self.attr("device/name").unwrap_or_default();
                return Some(format!("{kind} {name}").trim_end().to_string());
            }
        }

        let words: Vec<String> = ["device/vendor", "device/model"]
            .iter()
            .filter_map(|attr| self.attr(attr))
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    }

    /// Logical sector size in bytes
    pub fn logical_block_size(&self) -> Option<u64> {
        self.number("queue/logical_block_size").filter(|&n| n > 0)
    }

    /// Device size in bytes (sysfs always counts 512-byte units)
    pub fn size_bytes(&self) -> Option<u64> {
        self.number("size").map(|units| units * 512)
    }

    /// Optimal I/O size in bytes, `None` when the device gives no hint
    pub fn optimal_io_size(&self) -> Option<u64> {
        self.number("queue/optimal_io_size").filter(|&n| n > 0)
    }

    /// `major:minor` device number
    pub fn dev(&self) -> Option<String> {
        self.attr("dev")
    }
}
