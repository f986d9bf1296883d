//! Provisioning run
//!
//! Ties the stages together: open the device, verify its model and read the
//! layout, resolve the target bounds, classify, create the partition when
//! needed and finally make sure its filesystem is usable. The device handle
//! is owned by this function and released on every return path.

use crate::core::backend::{DeviceEvents, FilesystemBackend};
use crate::core::committer::{create_partition, Committed};
use crate::core::device::{self, BlockDevice, DeviceOpener};
use crate::core::layout::Geometry;
use crate::core::locator::{classify, Placement, TargetSpec};
use crate::core::readiness::{ensure_ready, ReadinessOptions, ReadinessReport};
use crate::core::region::resolve_sector;
use crate::core::settings::Settings;
use crate::error::{InitError, PartitionError, RegionBound, RegionSpecError};

/// What a provisioning run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Classification of the layout found on the device
    pub placement: Placement,
    /// Partition created by this run
    pub created: Option<Committed>,
    /// Readiness outcome; `None` when the partition was busy
    pub readiness: Option<ReadinessReport>,
}

/// Resolve the configured position expressions against `geometry`
pub fn resolve_target(settings: &Settings, geometry: &Geometry) -> Result<TargetSpec, InitError> {
    let start = resolve_sector(&settings.space_start, geometry).map_err(|source| {
        InitError::RegionSpec {
            bound: RegionBound::Start,
            source,
        }
    })?;

    let end = settings
        .space_end
        .as_deref()
        .map(|expr| resolve_sector(expr, geometry))
        .transpose()
        .map_err(|source| InitError::RegionSpec {
            bound: RegionBound::End,
            source,
        })?;

    if let Some(end) = end.filter(|end| *end <= start) {
        return Err(InitError::RegionSpec {
            bound: RegionBound::End,
            source: RegionSpecError::EndBeforeStart { start, end },
        });
    }

    Ok(TargetSpec { start, end })
}

/// Run the whole provisioning workflow once
pub fn provision<O, S>(settings: &Settings, opener: &O, system: &S) -> Result<ProvisionReport, InitError>
where
    O: DeviceOpener,
    S: FilesystemBackend + DeviceEvents + ?Sized,
{
    let mut device = opener.open(&settings.device)?;
    let layout = device::inspect(&mut device, &settings.model)?;
    let target = resolve_target(settings, &device.geometry())?;

    let placement = classify(&layout, &settings.part_label, target);
    tracing::debug!("Placement of '{}': {}", settings.part_label, placement.name());

    let created = match &placement {
        Placement::NotCreatable => {
            return Err(PartitionError::NotCreatable {
                label: settings.part_label.clone(),
            }
            .into());
        }
        Placement::ExistsBusy { .. } => {
            tracing::info!("Found mounted user data partition");
            return Ok(ProvisionReport {
                placement,
                created: None,
                readiness: None,
            });
        }
        Placement::ExistsIdle { .. } => {
            tracing::info!("Found existing user data partition");
            None
        }
        Placement::Creatable { target } => Some(create_partition(
            &mut device,
            system,
            &settings.part_label,
            *target,
        )?),
    };

    let readiness = ensure_ready(system, system, &ReadinessOptions::from_settings(settings))?;

    Ok(ProvisionReport {
        placement,
        created,
        readiness: Some(readiness),
    })
}
