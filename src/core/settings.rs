//! Run configuration
//!
//! Reads the `[initializer]` section from an INI file (or a `.toml` file with
//! the same table) and validates it into an immutable [`Settings`] value that
//! every stage borrows.

use configparser::ini::Ini;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{builtin, defaults};
use crate::error::ConfigError;

/// Keys understood in the `[initializer]` section
const KNOWN_KEYS: &[&str] = &[
    "device",
    "model",
    "space_start",
    "space_end",
    "skeleton",
    "part_label",
    "temp_mount_path",
    "node_timeout",
];

/// Validated configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Block device holding the partition table
    pub device: PathBuf,
    /// Expected hardware model, compared exactly
    pub model: String,
    /// Start of the user data partition, e.g. `2100MB`
    pub space_start: String,
    /// End of the user data partition; `None` extends to the end of the free region
    pub space_end: Option<String>,
    /// Skeleton archive unpacked after a reformat
    pub skeleton: PathBuf,
    /// GPT label identifying the user data partition
    pub part_label: String,
    /// Scratch mount point used while seeding
    pub temp_mount_path: PathBuf,
    /// Deadline for the partition node to appear; `None` waits forever
    pub node_timeout: Option<Duration>,
}

/// Section contents before validation; every key may be missing
#[derive(Debug, Default, Clone)]
struct RawSection {
    values: BTreeMap<String, String>,
}

impl RawSection {
    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// TOML flavour of the configuration file
#[derive(Debug, Deserialize)]
struct TomlFile {
    #[serde(default)]
    initializer: BTreeMap<String, toml::Value>,
}

impl Settings {
    /// Load settings from a configuration file
    ///
    /// Files ending in `.toml` are parsed as TOML, anything else as INI.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let section = if is_toml {
            parse_toml(path, &content)?
        } else {
            parse_ini(path, &content)?
        };

        Self::from_section(&section)
    }

    /// Parse settings from INI text
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let section = parse_ini(Path::new("<inline>"), content)?;
        Self::from_section(&section)
    }

    /// Settings compiled into the binary
    pub fn builtin() -> Self {
        Self {
            device: PathBuf::from(builtin::DEVICE),
            model: builtin::MODEL.to_string(),
            space_start: builtin::SPACE_START.to_string(),
            space_end: builtin::SPACE_END.map(str::to_string),
            skeleton: PathBuf::from(builtin::SKELETON),
            part_label: builtin::PART_LABEL.to_string(),
            temp_mount_path: PathBuf::from(builtin::TEMP_MOUNT_PATH),
            node_timeout: Some(Duration::from_secs(defaults::NODE_TIMEOUT_SECS)),
        }
    }

    /// Stable by-label path of the user data partition
    pub fn partition_path(&self) -> PathBuf {
        Path::new(defaults::BY_PARTLABEL_DIR).join(&self.part_label)
    }

    fn from_section(section: &RawSection) -> Result<Self, ConfigError> {
        for key in section.values.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(
                    "Ignoring unknown config item '{}' in [{}]",
                    key,
                    defaults::CONFIG_SECTION
                );
            }
        }

        let missing: Vec<String> = [
            "device",
            "model",
            "space_start",
            "skeleton",
            "part_label",
            "temp_mount_path",
        ]
        .iter()
        .filter(|key| section.get(key).is_none())
        .map(|key| (*key).to_string())
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys {
                section: defaults::CONFIG_SECTION.to_string(),
                keys: missing,
            });
        }

        // Checked above
        let required = |key: &str| section.get(key).unwrap_or_default().to_string();

        Ok(Self {
            device: PathBuf::from(required("device")),
            model: required("model"),
            space_start: required("space_start"),
            space_end: section.get("space_end").map(str::to_string),
            skeleton: PathBuf::from(required("skeleton")),
            part_label: required("part_label"),
            temp_mount_path: PathBuf::from(required("temp_mount_path")),
            node_timeout: parse_node_timeout(section.get("node_timeout"))?,
        })
    }
}

fn parse_node_timeout(value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value else {
        return Ok(Some(Duration::from_secs(defaults::NODE_TIMEOUT_SECS)));
    };

    let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
        key: "node_timeout".to_string(),
        value: value.to_string(),
        reason: "expected a whole number of seconds".to_string(),
    })?;

    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

fn parse_ini(path: &Path, content: &str) -> Result<RawSection, ConfigError> {
    let mut ini = Ini::new();
    ini.read(content.to_string())
        .map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;

    let values = ini
        .get_map_ref()
        .get(defaults::CONFIG_SECTION)
        .map(|section| {
            section
                .iter()
                .filter_map(|(key, value)| value.clone().map(|v| (key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    Ok(RawSection { values })
}

fn parse_toml(path: &Path, content: &str) -> Result<RawSection, ConfigError> {
    let file: TomlFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let values = file
        .initializer
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    Ok(RawSection { values })
}
