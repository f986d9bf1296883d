//! Infrastructure layer
//!
//! Handles all I/O: the partition table, sysfs, external tools and mounts.
//! This module is the only place where side effects occur.

pub mod gpt_device;
pub mod sysfs;
pub mod tools;
