//! Configuration constants
//!
//! - [`defaults`] - Default values, fixed paths and tool names
//! - [`builtin`] - Compiled-in settings for the config-less variant

pub mod builtin;
pub mod defaults;
