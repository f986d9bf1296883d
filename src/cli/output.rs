//! Output formatting
//!
//! One summary line per successful run on stdout; fatal errors on stderr.

use crate::core::locator::Placement;
use crate::core::provision::ProvisionReport;
use crate::core::settings::Settings;
use crate::error::InitError;

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";
}

/// Describe a finished run in one line
pub fn summarize(settings: &Settings, report: &ProvisionReport) -> String {
    let label = &settings.part_label;
    let partition = match (&report.placement, &report.created) {
        (Placement::ExistsBusy { number, .. }, _) => {
            return format!("Partition '{label}' ({number}) is in use, left untouched");
        }
        (_, Some(created)) => format!("Created partition '{label}' ({})", created.number),
        (Placement::ExistsIdle { number, .. }, None) => {
            format!("Partition '{label}' ({number}) present")
        }
        _ => format!("Partition '{label}'"),
    };

    match &report.readiness {
        Some(r) if r.reformatted => match &r.seed {
            Some(seed) if seed.is_complete() => format!("{partition}, formatted and seeded"),
            _ => format!("{partition}, formatted (skeleton not fully applied)"),
        },
        Some(_) => format!("{partition}, filesystem OK"),
        None => partition,
    }
}

/// Print the run summary to stdout
pub fn print_report(settings: &Settings, report: &ProvisionReport) {
    let incomplete = report
        .readiness
        .as_ref()
        .and_then(|r| r.seed.as_ref())
        .is_some_and(|seed| !seed.is_complete());
    let prefix = if incomplete {
        status::WARNING
    } else {
        status::SUCCESS
    };
    println!("{prefix} {}", summarize(settings, report));
}

/// Print a fatal error to stderr
///
/// The message of every [`InitError`] already embeds its cause.
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
}

/// Exit code for a fatal error; anything outside the taxonomy is `1`
pub fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<InitError>()
        .map_or(1, InitError::exit_code)
}
