//! GPT block device
//!
//! [`GptDevice`] implements [`BlockDevice`] on top of the `gpt` crate.
//! Identification (model, sector size, alignment) comes from sysfs and is
//! read on open; the partition table itself is only parsed by
//! [`BlockDevice::layout`]. New partitions are staged in memory and written
//! in one go by [`BlockDevice::commit`].
//!
//! Damaged or misplaced GPT headers are repaired automatically: the layout
//! is computed as if the table were already fixed, and the fix is written
//! together with the next commit (see [`TableRepair`]).

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use gpt::disk::LogicalBlockSize;
use gpt::partition_types;
use gpt::{GptConfig, GptDisk};
use procfs::process::{MountInfo, Process};

use crate::config::defaults;
use crate::core::device::{BlockDevice, DeviceOpener, NewPartition};
use crate::core::layout::{DiskLayout, Extent, Geometry, PartitionRegion};
use crate::error::{DeviceError, PartitionError};
use crate::infra::sysfs::Sysfs;
use crate::infra::tools::run_tool_checked;

/// Highest partition number a standard GPT can hold
const MAX_PARTITIONS: u32 = 128;

/// GPT inconsistency fixed automatically with the next commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRepair {
    /// Primary header unreadable; rebuilt from the backup
    PrimaryHeader,
    /// Backup header at the last sector unreadable; rebuilt from the primary
    BackupHeader,
    /// Backup header before the end of the disk (image written to a larger
    /// device); moved to the last sector and the usable range extended
    RelocateBackup {
        /// Sector the backup header was found at
        from: u64,
        /// Last sector of the device
        to: u64,
    },
}

impl fmt::Display for TableRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRepair::PrimaryHeader => f.write_str(
                "The primary GPT table is corrupt, but the backup appears OK, so that will be used",
            ),
            TableRepair::BackupHeader => f.write_str(
                "The backup GPT table is corrupt, but the primary appears OK, so that will be used",
            ),
            TableRepair::RelocateBackup { from, to } => write!(
                f,
                "The backup GPT table is not at the end of the disk (sector {from} instead of {to}), \
                 it will be moved to the end"
            ),
        }
    }
}

/// Repairs `disk` needs on a device whose last sector is `last_lba`
fn needed_repairs<D>(disk: &GptDisk<D>, last_lba: u64) -> Result<Vec<TableRepair>, String> {
    let header = disk.header();
    let backup_at = header.current_lba.max(header.backup_lba);
    if backup_at > last_lba {
        return Err(format!(
            "partition table belongs to a larger disk (backup header at sector {backup_at}, \
             last sector {last_lba})"
        ));
    }

    let mut repairs = Vec::new();
    if disk.primary_header().is_err() {
        repairs.push(TableRepair::PrimaryHeader);
    }
    if backup_at < last_lba {
        repairs.push(TableRepair::RelocateBackup {
            from: backup_at,
            to: last_lba,
        });
    } else if disk.backup_header().is_err() {
        repairs.push(TableRepair::BackupHeader);
    }
    Ok(repairs)
}

/// First partition number a table write would change
///
/// The table is written with its used entries packed from slot 1, so a
/// numbering with holes gets renumbered.
fn renumbered(numbers: &BTreeSet<u32>) -> Option<u32> {
    numbers
        .iter()
        .zip(1u32..)
        .find(|(number, slot)| **number != *slot)
        .map(|(number, _)| *number)
}

/// Opens block devices (or disk image files) as [`GptDevice`]s
#[derive(Debug, Clone)]
pub struct GptOpener {
    sysfs: Sysfs,
}

impl GptOpener {
    /// Opener reading device attributes from `sysfs`
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }

    /// Opener using the sysfs root from the environment
    pub fn from_env() -> Self {
        Self::new(Sysfs::from_env())
    }
}

impl DeviceOpener for GptOpener {
    type Device = GptDevice;

    fn open(&self, path: &Path) -> Result<GptDevice, DeviceError> {
        let open_error = |e: std::io::Error| DeviceError::Open {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        // Not O_EXCL: the kernel refuses it while sibling partitions are mounted
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_error)?;
        let block_device = file.metadata().map_err(open_error)?.file_type().is_block_device();

        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let attrs = self.sysfs.block(&name);

        let model = attrs.model().unwrap_or_else(|| "Unknown".to_string());
        let sector_size = attrs
            .logical_block_size()
            .unwrap_or(defaults::DEFAULT_SECTOR_SIZE);
        let block_size = LogicalBlockSize::try_from(sector_size).map_err(|e| DeviceError::Open {
            path: path.to_path_buf(),
            error: format!("{e}, got {sector_size}"),
        })?;
        let size_bytes = match attrs.size_bytes() {
            Some(size) => size,
            None => device_length(&mut file).map_err(open_error)?,
        };
        let geometry = Geometry {
            sector_size,
            total_sectors: size_bytes / sector_size,
        };
        let alignment = (attrs
            .optimal_io_size()
            .unwrap_or(defaults::DEFAULT_ALIGNMENT_BYTES)
            / sector_size)
            .max(1);

        tracing::debug!(
            "Opened {} ({} sectors of {} bytes, alignment {} sectors)",
            path.display(),
            geometry.total_sectors,
            geometry.sector_size,
            alignment
        );

        Ok(GptDevice {
            path: path.to_path_buf(),
            name,
            model,
            geometry,
            alignment,
            block_size,
            block_device,
            sysfs: self.sysfs.clone(),
            known: None,
            repairs: Vec::new(),
            pending: Vec::new(),
        })
    }
}

fn device_length(file: &mut File) -> std::io::Result<u64> {
    file.seek(SeekFrom::End(0))
}

/// A GPT-partitioned block device
#[derive(Debug)]
pub struct GptDevice {
    path: PathBuf,
    name: String,
    model: String,
    geometry: Geometry,
    alignment: u64,
    block_size: LogicalBlockSize,
    block_device: bool,
    sysfs: Sysfs,
    known: Option<DiskLayout>,
    repairs: Vec<TableRepair>,
    pending: Vec<(u32, NewPartition)>,
}

impl GptDevice {
    /// Partition suffix separator: `mmcblk0p1` but `sda1`
    fn separator(base: &str) -> &'static str {
        if base.ends_with(|c: char| c.is_ascii_digit()) {
            "p"
        } else {
            ""
        }
    }

    /// Device node of partition `number`
    pub fn partition_node(&self, number: u32) -> PathBuf {
        let base = self.path.to_string_lossy();
        PathBuf::from(format!("{base}{}{number}", Self::separator(&base)))
    }

    fn partition_name(&self, number: u32) -> String {
        format!("{}{}{number}", self.name, Self::separator(&self.name))
    }

    /// Repairs found by the last [`BlockDevice::layout`] call
    pub fn repairs(&self) -> &[TableRepair] {
        &self.repairs
    }

    /// Open the table with the header repairs applied in memory
    fn open_table(&self, writable: bool) -> Result<(GptDisk<File>, Vec<TableRepair>), String> {
        let mut disk = GptConfig::new()
            .writable(writable)
            .logical_block_size(self.block_size)
            .open(&self.path)
            .map_err(|e| e.to_string())?;

        let last_lba = self.geometry.total_sectors.saturating_sub(1);
        let repairs = needed_repairs(&disk, last_lba)?;
        if repairs
            .iter()
            .any(|r| matches!(r, TableRepair::RelocateBackup { .. }))
        {
            // rebuilding the headers places the backup at the device end
            let partitions = disk.take_partitions();
            disk.update_partitions(partitions)
                .map_err(|e| e.to_string())?;
        }
        Ok((disk, repairs))
    }

    fn is_busy(&self, number: u32, mounts: &[MountInfo]) -> bool {
        let node = self.partition_node(number);
        let node = node.to_string_lossy();
        let dev = self.sysfs.block(&self.partition_name(number)).dev();

        mounts.iter().any(|m| {
            m.mount_source.as_deref() == Some(node.as_ref())
                || dev.as_deref() == Some(m.majmin.as_str())
        })
    }

    fn layout_error(&self, error: impl ToString) -> DeviceError {
        DeviceError::Layout {
            path: self.path.clone(),
            error: error.to_string(),
        }
    }

    fn register(&self, number: u32) -> Result<(), PartitionError> {
        let nr = number.to_string();
        run_tool_checked(
            "partx",
            &[
                OsStr::new("--add"),
                OsStr::new("--nr"),
                OsStr::new(&nr),
                self.path.as_os_str(),
            ],
        )
        .map_err(|e| PartitionError::CommitFailed {
            error: format!("kernel did not accept partition {number}: {e}"),
        })
    }
}

fn commit_failed(error: impl ToString) -> PartitionError {
    PartitionError::CommitFailed {
        error: error.to_string(),
    }
}

fn mounts() -> Result<Vec<MountInfo>, procfs::ProcError> {
    Ok(Process::myself()?.mountinfo()?.0)
}

impl BlockDevice for GptDevice {
    fn path(&self) -> &Path {
        &self.path
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn optimal_alignment(&self) -> u64 {
        self.alignment
    }

    fn layout(&mut self) -> Result<DiskLayout, DeviceError> {
        let (disk, repairs) = self.open_table(false).map_err(|e| self.layout_error(e))?;
        let mounts = mounts().map_err(|e| self.layout_error(e))?;

        for repair in &repairs {
            tracing::warn!(
                "{}: {} (fixed on the next table write)",
                self.path.display(),
                repair
            );
        }

        let header = disk.header();
        let usable = Extent::new(header.first_usable, header.last_usable + 1);
        let partitions: Vec<PartitionRegion> = disk
            .partitions()
            .iter()
            .filter(|(_, p)| p.is_used())
            .map(|(&number, p)| PartitionRegion {
                number,
                extent: Extent::new(p.first_lba, p.last_lba + 1),
                label: p.name.clone(),
                active: true,
                busy: self.is_busy(number, &mounts),
            })
            .collect();

        let layout = DiskLayout::with_free_space(usable, partitions);
        self.known = Some(layout.clone());
        self.repairs = repairs;
        Ok(layout)
    }

    fn add_partition(&mut self, partition: &NewPartition) -> Result<u32, PartitionError> {
        let add_failed = |error: String| PartitionError::AddFailed {
            label: partition.label.clone(),
            error,
        };

        let layout = if let Some(layout) = self.known.clone() {
            layout
        } else {
            self.layout().map_err(|e| add_failed(e.to_string()))?
        };

        let duplicate = layout.labeled(&partition.label).next().is_some()
            || self.pending.iter().any(|(_, p)| p.label == partition.label);
        if duplicate {
            return Err(PartitionError::DuplicateLabel {
                label: partition.label.clone(),
            });
        }

        let fits = layout.free_regions().any(|free| {
            free.start <= partition.extent.start && partition.extent.end <= free.end
        }) && !self.pending.iter().any(|(_, p)| {
            p.extent.start < partition.extent.end && partition.extent.start < p.extent.end
        });
        if partition.extent.is_empty() || !fits {
            return Err(add_failed(format!(
                "{} is not inside free space",
                partition.extent
            )));
        }

        let number = (1..=MAX_PARTITIONS)
            .find(|n| {
                layout.partitions().all(|p| p.number != *n)
                    && self.pending.iter().all(|(pending, _)| pending != n)
            })
            .ok_or_else(|| add_failed("partition table is full".to_string()))?;

        let numbers: BTreeSet<u32> = layout
            .partitions()
            .map(|p| p.number)
            .chain(self.pending.iter().map(|(n, _)| *n))
            .chain([number])
            .collect();
        if let Some(moved) = renumbered(&numbers) {
            return Err(add_failed(format!(
                "writing the table would renumber partition {moved}"
            )));
        }

        tracing::debug!(
            "Staged partition {} '{}' at {}",
            number,
            partition.label,
            partition.extent
        );
        self.pending.push((number, partition.clone()));
        Ok(number)
    }

    fn commit(&mut self) -> Result<(), PartitionError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let (mut disk, repairs) = self.open_table(true).map_err(commit_failed)?;
        for (number, partition) in &pending {
            disk.add_partition_at(
                &partition.label,
                *number,
                partition.extent.start,
                partition.extent.len(),
                partition_types::LINUX_FS,
                0,
            )
            .map_err(commit_failed)?;
        }
        disk.write().map_err(commit_failed)?;
        self.known = None;
        self.repairs.clear();
        for repair in &repairs {
            tracing::info!("{}: fixed: {}", self.path.display(), repair);
        }

        if self.block_device {
            for (number, _) in &pending {
                self.register(*number)?;
            }
        } else {
            tracing::debug!(
                "{} is not a block device, skipping kernel registration",
                self.path.display()
            );
        }
        Ok(())
    }
}

impl Drop for GptDevice {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                "Discarding {} uncommitted partition(s) on {}",
                self.pending.len(),
                self.path.display()
            );
        }
        tracing::debug!("Closed {}", self.path.display());
    }
}
