//! Filesystem readiness
//!
//! Runs after the partition exists and is not in use:
//!
//! 1. wait for the partition device node, asking udev to settle meanwhile
//! 2. check the filesystem; a clean or auto-fixed result is final
//! 3. otherwise reformat (fatal on failure)
//! 4. seed the fresh filesystem from the skeleton archive (best effort)

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::defaults;
use crate::core::backend::{CheckStatus, DeviceEvents, FilesystemBackend};
use crate::core::settings::Settings;
use crate::error::FilesystemError;

/// Inputs of the readiness workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessOptions {
    /// Partition device node
    pub node: PathBuf,
    /// Archive unpacked after a reformat
    pub skeleton: PathBuf,
    /// Scratch mount point used while seeding
    pub mount_path: PathBuf,
    /// Delay between two node polls
    pub settle_interval: Duration,
    /// Give up waiting for the node after this long; `None` waits forever
    pub node_timeout: Option<Duration>,
}

impl ReadinessOptions {
    /// Derive options from the run settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            node: settings.partition_path(),
            skeleton: settings.skeleton.clone(),
            mount_path: settings.temp_mount_path.clone(),
            settle_interval: Duration::from_millis(defaults::SETTLE_INTERVAL_MS),
            node_timeout: settings.node_timeout,
        }
    }
}

/// Outcome of the best-effort seeding step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Fresh filesystem was mounted
    pub mounted: bool,
    /// Skeleton archive was unpacked
    pub extracted: bool,
    /// Filesystem was unmounted again
    pub unmounted: bool,
}

impl SeedReport {
    /// Whether every seeding step succeeded
    pub fn is_complete(&self) -> bool {
        self.mounted && self.extracted && self.unmounted
    }
}

/// Outcome of [`ensure_ready`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Node polls that found nothing before the node appeared
    pub missed_polls: u32,
    /// Consistency check result
    pub check: CheckStatus,
    /// Whether a fresh filesystem was created
    pub reformatted: bool,
    /// Seeding outcome, present only after a reformat
    pub seed: Option<SeedReport>,
}

/// Bring the user data filesystem to a usable state
pub fn ensure_ready<B, E>(
    backend: &B,
    events: &E,
    options: &ReadinessOptions,
) -> Result<ReadinessReport, FilesystemError>
where
    B: FilesystemBackend + ?Sized,
    E: DeviceEvents + ?Sized,
{
    let missed_polls = await_node(backend, events, options)?;

    let check = backend
        .check(&options.node)
        .map_err(|e| FilesystemError::CheckFailed {
            path: options.node.clone(),
            error: e.to_string(),
        })?;
    tracing::debug!("Filesystem check on {}: {:?}", options.node.display(), check);

    if check.is_usable() {
        return Ok(ReadinessReport {
            missed_polls,
            check,
            reformatted: false,
            seed: None,
        });
    }

    tracing::info!("User data partition is not initialized or corrupt. Formatting now...");
    backend
        .format(&options.node)
        .map_err(|e| FilesystemError::FormatFailed {
            path: options.node.clone(),
            error: e.to_string(),
        })?;

    let seed = seed(backend, options);

    Ok(ReadinessReport {
        missed_polls,
        check,
        reformatted: true,
        seed: Some(seed),
    })
}

/// Poll until the node exists, returning the number of missed polls
fn await_node<B, E>(backend: &B, events: &E, options: &ReadinessOptions) -> Result<u32, FilesystemError>
where
    B: FilesystemBackend + ?Sized,
    E: DeviceEvents + ?Sized,
{
    let started = Instant::now();
    let mut missed = 0u32;

    while !backend.node_exists(&options.node) {
        if let Some(timeout) = options.node_timeout {
            if started.elapsed() >= timeout {
                return Err(FilesystemError::NodeTimeout {
                    path: options.node.clone(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
        }

        if let Err(e) = events.settle(&options.node) {
            tracing::debug!("udev settle failed (ignored): {}", e);
        }
        thread::sleep(options.settle_interval);
        missed = missed.saturating_add(1);
    }

    if missed > 0 {
        tracing::debug!(
            "{} appeared after {} polls",
            options.node.display(),
            missed
        );
    }
    Ok(missed)
}

/// Mount, unpack the skeleton and unmount; failures are logged, never fatal
fn seed<B>(backend: &B, options: &ReadinessOptions) -> SeedReport
where
    B: FilesystemBackend + ?Sized,
{
    let mut report = SeedReport::default();

    if let Err(e) = backend.mount(&options.node, &options.mount_path) {
        tracing::warn!(
            "Failed to mount {} on {}, skipping skeleton: {}",
            options.node.display(),
            options.mount_path.display(),
            e
        );
        return report;
    }
    report.mounted = true;

    match backend.extract(&options.skeleton, &options.mount_path) {
        Ok(()) => report.extracted = true,
        Err(e) => tracing::warn!(
            "Failed to unpack skeleton {}: {}",
            options.skeleton.display(),
            e
        ),
    }

    match backend.unmount(&options.mount_path) {
        Ok(()) => report.unmounted = true,
        Err(e) => tracing::warn!(
            "Failed to unmount {}: {}",
            options.mount_path.display(),
            e
        ),
    }

    report
}
