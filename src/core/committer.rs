//! Partition creation
//!
//! Adds the user data partition to the table, writes the table back and
//! nudges the kernel to rescan. The add and the commit are never retried:
//! after a failure the on-disk state is unknown and only a fresh run, which
//! re-reads the table, can decide safely.

use crate::core::backend::DeviceEvents;
use crate::core::device::{BlockDevice, NewPartition};
use crate::core::layout::Extent;
use crate::error::PartitionError;

/// A partition that was added and committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Partition number
    pub number: u32,
    /// Aligned sectors occupied
    pub extent: Extent,
    /// Whether the advisory rescan succeeded
    pub rescanned: bool,
}

/// Shrink `target` to `grain`-aligned boundaries
///
/// The start moves up and the end moves down, so the result always stays
/// inside `target`. Returns `None` when no aligned sector range is left.
pub fn align(target: Extent, grain: u64) -> Option<Extent> {
    let grain = grain.max(1);
    let start = target.start.div_ceil(grain) * grain;
    let end = target.end / grain * grain;
    (end > start).then(|| Extent::new(start, end))
}

/// Create the labeled partition inside `target`
pub fn create_partition<D, E>(
    device: &mut D,
    events: &E,
    label: &str,
    target: Extent,
) -> Result<Committed, PartitionError>
where
    D: BlockDevice,
    E: DeviceEvents + ?Sized,
{
    let grain = device.optimal_alignment();
    let extent = align(target, grain).ok_or_else(|| PartitionError::AddFailed {
        label: label.to_string(),
        error: format!("no {grain}-sector aligned room inside {target}"),
    })?;

    tracing::info!("Adding user data partition to GPT table");
    tracing::debug!("Requested {}, aligned to {}", target, extent);

    let number = device.add_partition(&NewPartition {
        label: label.to_string(),
        extent,
    })?;
    device.commit()?;
    tracing::info!("Committed partition {} ({})", number, extent);

    let rescanned = match events.rescan(device.path()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Partition rescan failed (ignored): {}", e);
            false
        }
    };

    Ok(Committed {
        number,
        extent,
        rescanned,
    })
}
