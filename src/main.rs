//! userdata-init - first-boot provisioning of the eMMC user data partition
//!
//! Entry point for the userdata-init command-line application.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use userdata_init::cli::output::{display_error, exit_code};
use userdata_init::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q; stage messages are shown by default
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.run() {
        display_error(&e);
        std::process::exit(exit_code(&e));
    }
}
