//! Error types for userdata-init
//!
//! Domain-specific error types using thiserror. Each provisioning stage owns
//! one enum; [`InitError`] aggregates them and decides the process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Can't load config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config file is not valid INI/TOML
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// One or more required keys are absent or empty
    #[error("Missing config item(s) in [{section}]: {}", keys.join(", "))]
    MissingKeys { section: String, keys: Vec<String> },

    /// A key is present but its value is unusable
    #[error("Invalid value '{value}' for config item '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Block device errors raised before any mutation happens
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Device could not be opened
    #[error("Error opening {path}: {error}")]
    Open { path: PathBuf, error: String },

    /// Device reports a different hardware model than configured
    #[error("eMMC model mismatch on {path} (expected '{expected}', found '{found}')")]
    ModelMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Partition table could not be read
    #[error("Failed to read partition table of {path}: {error}")]
    Layout { path: PathBuf, error: String },
}

/// Region expression errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionSpecError {
    /// Expression is empty
    #[error("Empty position expression")]
    Empty,

    /// Expression does not match `<number>[unit]`
    #[error("Invalid position expression '{expr}'")]
    Malformed { expr: String },

    /// Unit suffix is not known
    #[error("Unknown unit '{unit}' in position expression '{expr}'")]
    UnknownUnit { expr: String, unit: String },

    /// Expression resolves to a sector outside of the device
    #[error("The location {expr} is outside of the device ({sectors} sectors)")]
    OutOfRange { expr: String, sectors: u64 },

    /// End resolves at or before the start
    #[error("The end sector {end} is not after the start sector {start}")]
    EndBeforeStart { start: u64, end: u64 },
}

/// Partition table mutation errors
#[derive(Error, Debug)]
pub enum PartitionError {
    /// No labeled partition and no free region can hold the target
    #[error("User data partition '{label}' doesn't exist, but is not creatable")]
    NotCreatable { label: String },

    /// A partition with this label is already in the table
    #[error("A partition labeled '{label}' already exists")]
    DuplicateLabel { label: String },

    /// Disk-layout library rejected the new partition
    #[error("Failed to add new partition '{label}': {error}")]
    AddFailed { label: String, error: String },

    /// Modified table could not be written back or reloaded
    #[error("Failed to commit new partition table: {error}")]
    CommitFailed { error: String },
}

/// Filesystem readiness errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Device node never appeared
    #[error("Partition node '{path}' did not appear within {waited_ms} ms")]
    NodeTimeout { path: PathBuf, waited_ms: u128 },

    /// Consistency checker could not be run at all
    #[error("Failed to run filesystem check on '{path}': {error}")]
    CheckFailed { path: PathBuf, error: String },

    /// Reformatting the partition failed
    #[error("Failed to format partition '{path}': {error}")]
    FormatFailed { path: PathBuf, error: String },
}

/// Which position expression failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionBound {
    /// `space_start`
    Start,
    /// `space_end`
    End,
}

impl std::fmt::Display for RegionBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionBound::Start => f.write_str("start"),
            RegionBound::End => f.write_str("end"),
        }
    }
}

/// Top-level userdata-init error type
#[derive(Error, Debug)]
pub enum InitError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Region expression error
    #[error("Invalid {bound} position config: {source}")]
    RegionSpec {
        bound: RegionBound,
        source: RegionSpecError,
    },

    /// Partition table error
    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl InitError {
    /// Process exit code reported to the caller
    ///
    /// `1` configuration or device, `2` partition table or filesystem,
    /// `3` invalid region expression.
    pub fn exit_code(&self) -> i32 {
        match self {
            InitError::Config(_) | InitError::Device(_) => 1,
            InitError::Partition(_) | InitError::Filesystem(_) => 2,
            InitError::RegionSpec { .. } => 3,
        }
    }
}
