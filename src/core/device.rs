//! Device inspection
//!
//! [`BlockDevice`] is the seam to the partition-table library. The inspector
//! refuses to look at the partition table of a device whose model does not
//! match the configured one, so nothing destructive can ever reach the wrong
//! hardware.

use std::path::Path;

use crate::core::layout::{DiskLayout, Extent, Geometry};
use crate::error::{DeviceError, PartitionError};

/// Partition to be added to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPartition {
    /// GPT partition name
    pub label: String,
    /// Sectors to occupy, already aligned
    pub extent: Extent,
}

/// An opened block device and its partition table
///
/// Implementations release the underlying handle when dropped.
pub trait BlockDevice {
    /// Device path
    fn path(&self) -> &Path;

    /// Model identifier reported by the hardware
    fn model(&self) -> &str;

    /// Sector geometry
    fn geometry(&self) -> Geometry;

    /// Optimal alignment grain in sectors
    fn optimal_alignment(&self) -> u64;

    /// Read the current partition and free-space layout
    fn layout(&mut self) -> Result<DiskLayout, DeviceError>;

    /// Add a partition to the in-memory table, returning its number
    fn add_partition(&mut self, partition: &NewPartition) -> Result<u32, PartitionError>;

    /// Write the in-memory table to the device and reload the kernel's view
    fn commit(&mut self) -> Result<(), PartitionError>;
}

/// Opens block devices
pub trait DeviceOpener {
    /// Device type produced
    type Device: BlockDevice;

    /// Open the device at `path` for reading and writing
    fn open(&self, path: &Path) -> Result<Self::Device, DeviceError>;
}

/// Verify the device model and read its layout
///
/// The layout is only read once the model matched.
pub fn inspect<D: BlockDevice>(
    device: &mut D,
    expected_model: &str,
) -> Result<DiskLayout, DeviceError> {
    verify_model(device, expected_model)?;
    device.layout()
}

/// Compare the reported model with the configured one, exactly
pub fn verify_model<D: BlockDevice>(device: &D, expected_model: &str) -> Result<(), DeviceError> {
    tracing::info!("Model: {}", device.model());

    if device.model() != expected_model {
        return Err(DeviceError::ModelMismatch {
            path: device.path().to_path_buf(),
            expected: expected_model.to_string(),
            found: device.model().to_string(),
        });
    }

    Ok(())
}
