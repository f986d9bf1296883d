//! Disk layout model
//!
//! A [`DiskLayout`] is the on-disk ordered list of partitions and free gaps,
//! read fresh from the device on every run. All bounds are in sectors and
//! half-open: a region covers `start..end`.

use std::fmt;

/// Sector geometry of a block device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Logical sector size in bytes
    pub sector_size: u64,
    /// Number of addressable sectors
    pub total_sectors: u64,
}

/// Half-open sector range `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Extent {
    /// First sector
    pub start: u64,
    /// One past the last sector
    pub end: u64,
}

impl Extent {
    /// Create an extent
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of sectors covered
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the extent covers no sector
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A partition entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRegion {
    /// Partition number in the table (1-based)
    pub number: u32,
    /// Sectors occupied
    pub extent: Extent,
    /// GPT partition name
    pub label: String,
    /// False for entries that do not describe a usable partition
    pub active: bool,
    /// Mounted or otherwise claimed by the kernel
    pub busy: bool,
}

/// One entry of a [`DiskLayout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    /// Unallocated sectors
    Free(Extent),
    /// An allocated partition
    Partition(PartitionRegion),
}

impl Region {
    /// Sectors covered by this region
    pub fn extent(&self) -> Extent {
        match self {
            Region::Free(extent) => *extent,
            Region::Partition(part) => part.extent,
        }
    }
}

/// Ordered partition and free-space map of a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskLayout {
    regions: Vec<Region>,
}

impl DiskLayout {
    /// Build a layout, ordering regions by their first sector
    pub fn new(mut regions: Vec<Region>) -> Self {
        regions.sort_by_key(|r| r.extent().start);
        Self { regions }
    }

    /// Build a layout from partitions, filling the gaps inside `usable` with
    /// free regions
    ///
    /// Sectors covered by more than one partition are never reported free.
    pub fn with_free_space(usable: Extent, partitions: Vec<PartitionRegion>) -> Self {
        let mut extents: Vec<Extent> = partitions.iter().map(|p| p.extent).collect();
        extents.sort();

        let mut regions: Vec<Region> = Vec::with_capacity(partitions.len() * 2 + 1);
        let mut cursor = usable.start;
        for extent in extents {
            let gap = Extent::new(cursor, extent.start.min(usable.end));
            if !gap.is_empty() {
                regions.push(Region::Free(gap));
            }
            cursor = cursor.max(extent.end);
        }
        let tail = Extent::new(cursor, usable.end);
        if !tail.is_empty() {
            regions.push(Region::Free(tail));
        }

        regions.extend(partitions.into_iter().map(Region::Partition));
        Self::new(regions)
    }

    /// Regions in on-disk order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Partitions in on-disk order
    pub fn partitions(&self) -> impl Iterator<Item = &PartitionRegion> {
        self.regions.iter().filter_map(|r| match r {
            Region::Partition(part) => Some(part),
            Region::Free(_) => None,
        })
    }

    /// Free gaps in on-disk order
    pub fn free_regions(&self) -> impl Iterator<Item = Extent> + '_ {
        self.regions.iter().filter_map(|r| match r {
            Region::Free(extent) => Some(*extent),
            Region::Partition(_) => None,
        })
    }

    /// Active partitions carrying `label`
    pub fn labeled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a PartitionRegion> {
        self.partitions()
            .filter(move |part| part.active && part.label == label)
    }
}
