//! Default configuration values

/// INI section (or TOML table) holding all settings
pub const CONFIG_SECTION: &str = "initializer";

/// Directory where udev publishes partitions by their GPT label
pub const BY_PARTLABEL_DIR: &str = "/dev/disk/by-partlabel";

/// Delay between two polls for the partition device node (in milliseconds)
pub const SETTLE_INTERVAL_MS: u64 = 5;

/// How long to wait for the partition device node (in seconds, 0 = forever)
pub const NODE_TIMEOUT_SECS: u64 = 30;

/// Filesystem created on the user data partition
pub const FILESYSTEM_TYPE: &str = "ext4";

/// Alignment grain used when the device does not report one (1 MiB)
pub const DEFAULT_ALIGNMENT_BYTES: u64 = 1024 * 1024;

/// Sector size assumed when the device does not report one
pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// Unit applied to position expressions without a suffix
pub const DEFAULT_UNIT: &str = "MB";

/// Root of the sysfs mount
pub const SYSFS_ROOT: &str = "/sys";

/// Environment variable overriding [`SYSFS_ROOT`]
pub const ENV_SYSFS_ROOT: &str = "USERDATA_INIT_SYSFS";
