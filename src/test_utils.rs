//! Test utilities
//!
//! In-memory stand-ins for the block device and the system tools, recording
//! every call so tests can assert what was (and was not) touched.

#[cfg(test)]
pub mod fakes {
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use crate::core::backend::{CheckStatus, DeviceEvents, FilesystemBackend};
    use crate::core::device::{BlockDevice, DeviceOpener, NewPartition};
    use crate::core::layout::{DiskLayout, Extent, Geometry, PartitionRegion, Region};
    use crate::error::{DeviceError, PartitionError};

    /// What happened to a [`FakeDevice`] and its clones
    #[derive(Debug, Clone, Default)]
    pub struct DeviceJournal {
        /// Number of layout reads
        pub layout_reads: u32,
        /// Partitions accepted by `add_partition`
        pub added: Vec<NewPartition>,
        /// Number of commit attempts
        pub commits: u32,
        /// Number of handles dropped
        pub closes: u32,
    }

    /// Block device backed by a shared in-memory layout
    ///
    /// Clones share the layout and the journal, so a device opened twice sees
    /// the partitions committed by the first handle.
    #[derive(Debug, Clone)]
    pub struct FakeDevice {
        path: PathBuf,
        model: String,
        geometry: Geometry,
        alignment: u64,
        layout: Rc<RefCell<DiskLayout>>,
        journal: Rc<RefCell<DeviceJournal>>,
        pending: Vec<PartitionRegion>,
        fail_add: Option<String>,
        fail_commit: Option<String>,
    }

    impl FakeDevice {
        /// 8000 MB `/dev/mmcblk0` reporting `model`
        pub fn new(model: &str, layout: DiskLayout) -> Self {
            Self {
                path: PathBuf::from("/dev/mmcblk0"),
                model: model.to_string(),
                geometry: Geometry {
                    sector_size: 512,
                    total_sectors: 15_625_000,
                },
                alignment: 2048,
                layout: Rc::new(RefCell::new(layout)),
                journal: Rc::new(RefCell::new(DeviceJournal::default())),
                pending: Vec::new(),
                fail_add: None,
                fail_commit: None,
            }
        }

        /// Make `add_partition` fail
        pub fn fail_add(mut self, error: &str) -> Self {
            self.fail_add = Some(error.to_string());
            self
        }

        /// Make `commit` fail
        pub fn fail_commit(mut self, error: &str) -> Self {
            self.fail_commit = Some(error.to_string());
            self
        }

        /// Snapshot of the journal
        pub fn journal(&self) -> DeviceJournal {
            self.journal.borrow().clone()
        }

        /// Current committed layout
        pub fn current_layout(&self) -> DiskLayout {
            self.layout.borrow().clone()
        }
    }

    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.journal.borrow_mut().closes += 1;
        }
    }

    impl BlockDevice for FakeDevice {
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
            self.journal.borrow_mut().layout_reads += 1;
            Ok(self.layout.borrow().clone())
        }

        fn add_partition(&mut self, partition: &NewPartition) -> Result<u32, PartitionError> {
            if let Some(error) = &self.fail_add {
                return Err(PartitionError::AddFailed {
                    label: partition.label.clone(),
                    error: error.clone(),
                });
            }

            let layout = self.layout.borrow();
            let duplicate = layout.labeled(&partition.label).next().is_some()
                || self.pending.iter().any(|p| p.label == partition.label);
            if duplicate {
                return Err(PartitionError::DuplicateLabel {
                    label: partition.label.clone(),
                });
            }

            let fits = layout.free_regions().any(|free| {
                free.start <= partition.extent.start && partition.extent.end <= free.end
            });
            if !fits {
                return Err(PartitionError::AddFailed {
                    label: partition.label.clone(),
                    error: "overlaps an existing partition".to_string(),
                });
            }

            let number = layout
                .partitions()
                .map(|p| p.number)
                .chain(self.pending.iter().map(|p| p.number))
                .max()
                .unwrap_or(0)
                + 1;
            drop(layout);

            self.pending.push(PartitionRegion {
                number,
                extent: partition.extent,
                label: partition.label.clone(),
                active: true,
                busy: false,
            });
            self.journal.borrow_mut().added.push(partition.clone());
            Ok(number)
        }

        fn commit(&mut self) -> Result<(), PartitionError> {
            self.journal.borrow_mut().commits += 1;
            if let Some(error) = &self.fail_commit {
                return Err(PartitionError::CommitFailed {
                    error: error.clone(),
                });
            }

            let mut layout = self.layout.borrow_mut();
            let mut regions = layout.regions().to_vec();
            for part in self.pending.drain(..) {
                regions = split_free(regions, part);
            }
            *layout = DiskLayout::new(regions);
            Ok(())
        }
    }

    fn split_free(regions: Vec<Region>, part: PartitionRegion) -> Vec<Region> {
        let mut out = Vec::with_capacity(regions.len() + 2);
        let mut part = Some(part);
        for region in regions {
            match (&region, &part) {
                (Region::Free(free), Some(p))
                    if free.start <= p.extent.start && p.extent.end <= free.end =>
                {
                    let before = Extent::new(free.start, p.extent.start);
                    let after = Extent::new(p.extent.end, free.end);
                    if !before.is_empty() {
                        out.push(Region::Free(before));
                    }
                    if let Some(p) = part.take() {
                        out.push(Region::Partition(p));
                    }
                    if !after.is_empty() {
                        out.push(Region::Free(after));
                    }
                }
                _ => out.push(region),
            }
        }
        out
    }

    /// Opener handing out clones of one [`FakeDevice`]
    #[derive(Debug)]
    pub struct FakeOpener {
        device: FakeDevice,
        fail_open: Option<String>,
    }

    impl FakeOpener {
        /// Opener for `device`
        pub fn new(device: FakeDevice) -> Self {
            Self {
                device,
                fail_open: None,
            }
        }

        /// Make `open` fail
        pub fn fail_open(mut self, error: &str) -> Self {
            self.fail_open = Some(error.to_string());
            self
        }

        /// Journal shared by every handle handed out
        pub fn journal(&self) -> DeviceJournal {
            self.device.journal()
        }

        /// Current committed layout
        pub fn layout(&self) -> DiskLayout {
            self.device.current_layout()
        }
    }

    impl DeviceOpener for FakeOpener {
        type Device = FakeDevice;

        fn open(&self, path: &Path) -> Result<FakeDevice, DeviceError> {
            if let Some(error) = &self.fail_open {
                return Err(DeviceError::Open {
                    path: path.to_path_buf(),
                    error: error.clone(),
                });
            }
            Ok(self.device.clone())
        }
    }

    /// Recording stand-in for the system tools
    #[derive(Debug)]
    pub struct FakeSystem {
        calls: RefCell<Vec<String>>,
        failing: HashSet<&'static str>,
        check_code: Option<i32>,
        missing_polls: Cell<u32>,
        node_never: bool,
    }

    impl Default for FakeSystem {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeSystem {
        /// Node present, filesystem clean, every operation succeeds
        pub fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                failing: HashSet::new(),
                check_code: Some(0),
                missing_polls: Cell::new(0),
                node_never: false,
            }
        }

        /// Exit code reported by the filesystem check
        pub fn check_exit(mut self, code: Option<i32>) -> Self {
            self.check_code = code;
            self
        }

        /// Make the named operation fail
        pub fn fail(mut self, operation: &'static str) -> Self {
            self.failing.insert(operation);
            self
        }

        /// Make the rescan fail
        pub fn fail_rescan(self) -> Self {
            self.fail("rescan")
        }

        /// Node appears after `polls` failed polls
        pub fn node_after(self, polls: u32) -> Self {
            self.missing_polls.set(polls);
            self
        }

        /// Node never appears
        pub fn node_never(mut self) -> Self {
            self.node_never = true;
            self
        }

        /// Recorded calls, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// Whether `operation` was called at least once
        pub fn called(&self, operation: &str) -> bool {
            let prefix = format!("{operation} ");
            self.calls.borrow().iter().any(|c| c.starts_with(&prefix))
        }

        fn record(&self, operation: &'static str, args: &[&Path]) -> io::Result<()> {
            let mut call = operation.to_string();
            for arg in args {
                call.push(' ');
                call.push_str(&arg.display().to_string());
            }
            self.calls.borrow_mut().push(call);

            if self.failing.contains(operation) {
                Err(io::Error::other(format!("{operation} failed")))
            } else {
                Ok(())
            }
        }
    }

    impl FilesystemBackend for FakeSystem {
        fn node_exists(&self, _node: &Path) -> bool {
            if self.node_never {
                return false;
            }
            let remaining = self.missing_polls.get();
            if remaining == 0 {
                return true;
            }
            self.missing_polls.set(remaining - 1);
            false
        }

        fn check(&self, node: &Path) -> io::Result<CheckStatus> {
            self.record("check", &[node])?;
            Ok(CheckStatus::from_exit_code(self.check_code))
        }

        fn format(&self, node: &Path) -> io::Result<()> {
            self.record("format", &[node])
        }

        fn mount(&self, node: &Path, target: &Path) -> io::Result<()> {
            self.record("mount", &[node, target])
        }

        fn unmount(&self, target: &Path) -> io::Result<()> {
            self.record("unmount", &[target])
        }

        fn extract(&self, archive: &Path, target: &Path) -> io::Result<()> {
            self.record("extract", &[archive, target])
        }
    }

    impl DeviceEvents for FakeSystem {
        fn settle(&self, node: &Path) -> io::Result<()> {
            self.record("settle", &[node])
        }

        fn rescan(&self, device: &Path) -> io::Result<()> {
            self.record("rescan", &[device])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use crate::core::device::{BlockDevice, DeviceOpener, NewPartition};
    use crate::core::layout::{DiskLayout, Extent, Region};
    use crate::error::PartitionError;
    use std::path::Path;

    fn opener() -> FakeOpener {
        FakeOpener::new(FakeDevice::new(
            "MMC 4FTE4R",
            DiskLayout::new(vec![Region::Free(Extent::new(34, 10_000))]),
        ))
    }

    #[test]
    fn test_fake_device_commit_splits_free_space() {
        let opener = opener();
        let mut dev = opener.open(Path::new("/dev/mmcblk0")).unwrap();
        dev.add_partition(&NewPartition {
            label: "userdata".to_string(),
            extent: Extent::new(2048, 8192),
        })
        .unwrap();
        dev.commit().unwrap();

        let layout = opener.layout();
        let extents: Vec<Extent> = layout.regions().iter().map(Region::extent).collect();
        assert_eq!(
            extents,
            vec![
                Extent::new(34, 2048),
                Extent::new(2048, 8192),
                Extent::new(8192, 10_000)
            ]
        );
    }

    #[test]
    fn test_fake_device_refuses_duplicate_label() {
        let opener = opener();
        let mut dev = opener.open(Path::new("/dev/mmcblk0")).unwrap();
        let request = NewPartition {
            label: "userdata".to_string(),
            extent: Extent::new(2048, 4096),
        };
        dev.add_partition(&request).unwrap();
        let err = dev.add_partition(&request).unwrap_err();
        assert!(matches!(err, PartitionError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_fake_system_node_polls() {
        use crate::core::backend::FilesystemBackend;

        let system = FakeSystem::new().node_after(2);
        let node = Path::new("/dev/disk/by-partlabel/userdata");
        assert!(!system.node_exists(node));
        assert!(!system.node_exists(node));
        assert!(system.node_exists(node));
    }
}
