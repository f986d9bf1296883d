//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no provisioning logic - that belongs in [`crate::core`].

pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use crate::core::provision::provision;
use crate::core::settings::Settings;
use crate::error::InitError;
use crate::infra::gpt_device::GptOpener;
use crate::infra::tools::SystemTools;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    ", built ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    ")"
);

/// userdata-init - first-boot provisioning of the eMMC user data partition
///
/// Makes sure the labeled user data partition exists and holds a usable
/// filesystem. Safe to run on every boot.
#[derive(Parser, Debug)]
#[command(name = "userdata-init")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Use the settings compiled into the binary instead of a config file
    #[arg(long, conflicts_with = "config")]
    pub builtin: bool,

    /// Configuration file (INI, or TOML when named *.toml)
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Execute one provisioning run
    pub fn run(self) -> Result<()> {
        let settings = if self.builtin {
            Settings::builtin()
        } else if let Some(path) = &self.config {
            Settings::load(path).map_err(InitError::from)?
        } else {
            // Nothing to do without a configuration, show help
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };

        tracing::debug!("Settings: {:?}", settings);
        let report = provision(&settings, &GptOpener::from_env(), &SystemTools::new())?;

        if !self.quiet {
            output::print_report(&settings, &report);
        }
        Ok(())
    }
}
