//! Compiled-in settings
//!
//! Used by `--builtin` on boards that ship without a configuration file.
//! The values describe the reference board: a 4FTE4R eMMC whose user data
//! partition starts at 2100 MB and takes the rest of the free space.

/// Block device holding the partition table
pub const DEVICE: &str = "/dev/mmcblk0";

/// Model string reported for [`DEVICE`]
pub const MODEL: &str = "MMC 4FTE4R";

/// Start of the user data partition
pub const SPACE_START: &str = "2100MB";

/// End of the user data partition (`None` = end of the free region)
pub const SPACE_END: Option<&str> = None;

/// Archive unpacked into a freshly formatted partition
pub const SKELETON: &str = "/usr/share/userdata-init/skeleton.tar.gz";

/// GPT partition label
pub const PART_LABEL: &str = "userdata";

/// Scratch mount point used while seeding
pub const TEMP_MOUNT_PATH: &str = "/mnt";
