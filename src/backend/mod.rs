pub mod btrfs;
pub mod parse;

pub use btrfs::BtrfsBackend;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// One subvolume as reported by the backend, before ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubvolumeEntry {
    /// Absolute path of the subvolume root
    pub path: PathBuf,
    /// Filesystem transaction (generation) id of the subvolume
    pub transaction: u64,
}

impl SubvolumeEntry {
    pub fn new(path: impl Into<PathBuf>, transaction: u64) -> Self {
        SubvolumeEntry {
            path: path.into(),
            transaction,
        }
    }
}

/// Read-only queries against a copy-on-write filesystem with snapshots.
///
/// Implementations must be free of side effects on the filesystem; every call
/// may be repeated. Errors propagate to the caller unchanged, there is no retry.
pub trait SnapshotBackend {
    /// Enumerate all subvolumes below `mount`, in any order
    fn list_subvolumes(&self, mount: &Path) -> Result<Vec<SubvolumeEntry>>;

    /// ISO-8601 creation time of the snapshot at `snapshot`
    ///
    /// Fails with `MetadataUnavailable` when the subvolume carries no creation time.
    fn creation_time(&self, snapshot: &Path) -> Result<String>;

    /// Paths (relative to the snapshot root) modified after `base_transaction`
    ///
    /// A base of `0` means every file written since the subvolume was created.
    fn find_changed_paths(&self, snapshot: &Path, base_transaction: u64) -> Result<Vec<PathBuf>>;
}

impl<B: SnapshotBackend + ?Sized> SnapshotBackend for &B {
    fn list_subvolumes(&self, mount: &Path) -> Result<Vec<SubvolumeEntry>> {
        (**self).list_subvolumes(mount)
    }

    fn creation_time(&self, snapshot: &Path) -> Result<String> {
        (**self).creation_time(snapshot)
    }

    fn find_changed_paths(&self, snapshot: &Path, base_transaction: u64) -> Result<Vec<PathBuf>> {
        (**self).find_changed_paths(snapshot, base_transaction)
    }
}
