//! userdata-init - first-boot provisioning of the eMMC user data partition
//!
//! On every boot the tool makes sure a labeled partition exists at a
//! configured position on the eMMC, creates it in free space if needed, and
//! leaves it holding a usable ext4 filesystem seeded from a skeleton archive.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Provisioning decisions (no direct I/O)
//! - [`infra`] - Partition table, sysfs, external tools and mounts
//! - [`config`] - Constants and the built-in configuration
//! - [`error`] - Error types and exit codes

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
