//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a scratch
//! directory holding disk images, a fake sysfs tree and config files.

#![allow(dead_code)]

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gpt::disk::LogicalBlockSize;
use gpt::partition_types;
use gpt::GptConfig;
use procfs::process::Process;
use tempfile::TempDir;

/// Bytes per sector of every test image
pub const SECTOR: u64 = 512;

/// Test project context
///
/// Creates a temporary directory for images and configs and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Root of the fake sysfs tree
    pub fn sysfs(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Register `device` in the fake sysfs as an MMC card called `name`
    pub fn fake_mmc(&self, device: &str, name: &str) {
        let dir = self.sysfs().join("class/block").join(device);
        fs::create_dir_all(dir.join("device")).expect("Failed to create sysfs entry");
        fs::write(dir.join("device/type"), "MMC\n").expect("Failed to write sysfs type");
        fs::write(dir.join("device/name"), format!("{name}\n"))
            .expect("Failed to write sysfs name");
    }

    /// Zero-filled image of `sectors` sectors
    pub fn blank_image(&self, name: &str, sectors: u64) -> PathBuf {
        let path = self.dir.path().join(name);
        File::create(&path)
            .and_then(|f| f.set_len(sectors * SECTOR))
            .expect("Failed to create image");
        path
    }

    /// Image with a GPT holding `partitions` as `(label, first_lba, sectors)`
    pub fn gpt_image(&self, name: &str, sectors: u64, partitions: &[(&str, u64, u64)]) -> PathBuf {
        let path = self.blank_image(name, sectors);
        let mut disk = GptConfig::new()
            .writable(true)
            .logical_block_size(LogicalBlockSize::Lb512)
            .create(&path)
            .expect("Failed to create GPT");
        for (id, (label, first, len)) in (1u32..).zip(partitions) {
            disk.add_partition_at(label, id, *first, *len, partition_types::LINUX_FS, 0)
                .expect("Failed to add partition");
        }
        disk.write().expect("Failed to write GPT");
        path
    }

    /// Partitions of an image as `(number, label, first_lba, last_lba)`
    pub fn read_partitions(path: &Path) -> Vec<(u32, String, u64, u64)> {
        let disk = GptConfig::new()
            .writable(false)
            .logical_block_size(LogicalBlockSize::Lb512)
            .open(path)
            .expect("Failed to read GPT");
        disk.partitions()
            .iter()
            .filter(|(_, p)| p.is_used())
            .map(|(&n, p)| (n, p.name.clone(), p.first_lba, p.last_lba))
            .collect()
    }

    /// Extend an image to `sectors`, as when a smaller image is flashed
    /// onto a larger card
    pub fn grow_image(path: &Path, sectors: u64) {
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|f| f.set_len(sectors * SECTOR))
            .expect("Failed to grow image");
    }

    /// Backup header position and last usable sector of an image
    pub fn read_backup(path: &Path) -> (u64, u64) {
        let disk = GptConfig::new()
            .writable(false)
            .logical_block_size(LogicalBlockSize::Lb512)
            .open(path)
            .expect("Failed to read GPT");
        let header = disk.header();
        (header.backup_lba, header.last_usable)
    }

    /// Give the sysfs entry of `partition` (e.g. `mmcblk0p2`) the device
    /// number of a mount this process can see, so it reads as busy
    pub fn fake_mounted_partition(&self, partition: &str) {
        let mounts = Process::myself()
            .and_then(|p| p.mountinfo())
            .expect("Failed to read mountinfo");
        let mount = mounts.0.first().expect("No mounts visible");
        let dir = self.sysfs().join("class/block").join(partition);
        fs::create_dir_all(&dir).expect("Failed to create sysfs entry");
        fs::write(dir.join("dev"), format!("{}\n", mount.majmin)).expect("Failed to write dev");
    }

    /// Write an `[initializer]` config for `device`
    pub fn config(&self, device: &Path, space_start: &str, space_end: Option<&str>) -> PathBuf {
        let mut content = format!(
            "[initializer]\n\
             device = {}\n\
             model = MMC 4FTE4R\n\
             space_start = {space_start}\n\
             skeleton = {}\n\
             part_label = userdata\n\
             temp_mount_path = {}\n\
             node_timeout = 1\n",
            device.display(),
            self.dir.path().join("skeleton.tar.gz").display(),
            self.dir.path().join("mnt").display(),
        );
        if let Some(end) = space_end {
            content.push_str(&format!("space_end = {end}\n"));
        }
        self.create_file("userdata-init.conf", &content)
    }

    /// Run the binary with the fake sysfs
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_userdata-init"))
            .current_dir(self.dir.path())
            .env("USERDATA_INIT_SYSFS", self.sysfs())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute userdata-init")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
