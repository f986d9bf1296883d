//! Partition placement
//!
//! Classifies a device layout against the requested target into exactly one
//! [`Placement`]. The scan walks the layout once in on-disk order; the first
//! free region strictly containing the target wins, and an existing labeled
//! partition always takes precedence over creatability.

use crate::core::layout::{DiskLayout, Extent};

/// Requested bounds of the user data partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    /// First sector
    pub start: u64,
    /// End sector; `None` extends to the end of the enclosing free region
    pub end: Option<u64>,
}

/// Outcome of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Labeled partition present and not in use
    ExistsIdle {
        /// Partition number
        number: u32,
        /// Sectors occupied
        extent: Extent,
    },
    /// Labeled partition present and mounted or claimed
    ExistsBusy {
        /// Partition number
        number: u32,
        /// Sectors occupied
        extent: Extent,
    },
    /// No labeled partition; a free region can hold the target
    Creatable {
        /// Resolved target bounds
        target: Extent,
    },
    /// No labeled partition and no free region holds the target
    NotCreatable,
}

impl Placement {
    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            Placement::ExistsIdle { .. } => "exists-idle",
            Placement::ExistsBusy { .. } => "exists-busy",
            Placement::Creatable { .. } => "creatable",
            Placement::NotCreatable => "not-creatable",
        }
    }
}

/// Classify `layout` for a partition labeled `label` at `target`
///
/// A deferred end is taken from the first free region that starts before
/// and ends after `target.start`.
///
/// If several partitions carry the label, the result is busy as soon as any
/// of them is busy.
pub fn classify(layout: &DiskLayout, label: &str, target: TargetSpec) -> Placement {
    let mut existing: Option<(u32, Extent, bool)> = None;
    let mut creatable: Option<Extent> = None;

    for part in layout.labeled(label) {
        existing = match existing {
            None => Some((part.number, part.extent, part.busy)),
            Some((number, extent, busy)) if busy || !part.busy => Some((number, extent, busy)),
            Some(_) => Some((part.number, part.extent, true)),
        };
    }

    for free in layout.free_regions() {
        if creatable.is_some() {
            break;
        }
        if free.start >= target.start {
            continue;
        }
        match target.end {
            Some(end) if free.end > end => creatable = Some(Extent::new(target.start, end)),
            Some(_) => {}
            None if free.end > target.start => {
                creatable = Some(Extent::new(target.start, free.end));
            }
            None => {}
        }
    }

    match (existing, creatable) {
        (Some((number, extent, false)), _) => Placement::ExistsIdle { number, extent },
        (Some((number, extent, true)), _) => Placement::ExistsBusy { number, extent },
        (None, Some(target)) => Placement::Creatable { target },
        (None, None) => Placement::NotCreatable,
    }
}
