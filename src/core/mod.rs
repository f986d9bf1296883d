//! Core provisioning logic
//!
//! Decisions live here; anything touching the disk or spawning processes is
//! reached through the traits in [`device`] and [`backend`], implemented in
//! [`crate::infra`].
//!
//! # Submodules
//!
//! - [`settings`] - Run settings (INI/TOML config or built-in)
//! - [`region`] - Position expressions to sector numbers
//! - [`layout`] - Disk geometry and partition layout model
//! - [`device`] - Block device seam and model verification
//! - [`locator`] - Placement classification of the user data partition
//! - [`committer`] - Partition creation
//! - [`backend`] - Filesystem and device-event seams
//! - [`readiness`] - Check, reformat and seed workflow
//! - [`provision`] - The whole run

pub mod backend;
pub mod committer;
pub mod device;
pub mod layout;
pub mod locator;
pub mod provision;
pub mod readiness;
pub mod region;
pub mod settings;
