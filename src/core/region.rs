//! Position expressions
//!
//! Turns human readable offsets such as `2100MB`, `50%` or `-1s` into an
//! absolute sector on a given device. Units follow the usual partitioning
//! tool conventions: SI units for `kB`/`MB`/`GB`/`TB`, binary units for
//! `KiB`..`TiB`, `s` for raw sectors and `%` for a share of the device.
//! A negative value counts from the end of the device.

use regex::Regex;
use std::sync::OnceLock;

use crate::config::defaults;
use crate::core::layout::Geometry;
use crate::error::RegionSpecError;

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([+-]?)\s*(\d+(?:\.\d*)?|\.\d+)\s*([A-Za-z%]*)$")
            .unwrap_or_else(|e| panic!("position expression regex is invalid: {e}"))
    })
}

/// Unit of a position expression
#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Sector,
    Bytes(f64),
    Percent,
}

impl Unit {
    fn parse(expr: &str, suffix: &str) -> Result<Self, RegionSpecError> {
        let suffix = if suffix.is_empty() {
            defaults::DEFAULT_UNIT
        } else {
            suffix
        };

        let unit = match suffix.to_ascii_lowercase().as_str() {
            "s" => Unit::Sector,
            "b" => Unit::Bytes(1.0),
            "kb" => Unit::Bytes(1e3),
            "mb" => Unit::Bytes(1e6),
            "gb" => Unit::Bytes(1e9),
            "tb" => Unit::Bytes(1e12),
            "kib" => Unit::Bytes(1024.0),
            "mib" => Unit::Bytes(1024.0 * 1024.0),
            "gib" => Unit::Bytes(1024.0 * 1024.0 * 1024.0),
            "tib" => Unit::Bytes(1024.0 * 1024.0 * 1024.0 * 1024.0),
            "%" => Unit::Percent,
            _ => {
                return Err(RegionSpecError::UnknownUnit {
                    expr: expr.to_string(),
                    unit: suffix.to_string(),
                })
            }
        };
        Ok(unit)
    }
}

/// Resolve a position expression to an absolute sector on `geometry`
///
/// Byte quantities are rounded to the nearest sector. Percentages are
/// clamped to the last sector so that `100%` names the end of the device.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resolve_sector(expr: &str, geometry: &Geometry) -> Result<u64, RegionSpecError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(RegionSpecError::Empty);
    }

    let caps = expression_regex()
        .captures(trimmed)
        .ok_or_else(|| RegionSpecError::Malformed {
            expr: trimmed.to_string(),
        })?;

    let negative = &caps[1] == "-";
    let value: f64 = caps[2].parse().map_err(|_| RegionSpecError::Malformed {
        expr: trimmed.to_string(),
    })?;
    let unit = Unit::parse(trimmed, &caps[3])?;

    let total = geometry.total_sectors;
    let out_of_range = || RegionSpecError::OutOfRange {
        expr: trimmed.to_string(),
        sectors: total,
    };

    let magnitude = match unit {
        Unit::Sector => value.round(),
        Unit::Bytes(unit_size) => (value * unit_size / geometry.sector_size as f64).round(),
        Unit::Percent => {
            let sectors = (value / 100.0 * total as f64).round();
            sectors.min(total.saturating_sub(1) as f64)
        }
    };

    if !magnitude.is_finite() || magnitude > u64::MAX as f64 {
        return Err(out_of_range());
    }
    let magnitude = magnitude as u64;

    let sector = if negative {
        total.checked_sub(magnitude).ok_or_else(out_of_range)?
    } else {
        magnitude
    };

    if sector >= total {
        return Err(out_of_range());
    }

    Ok(sector)
}
