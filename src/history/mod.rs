//! Snapshot subvolumes viewed as a linear commit history.
//!
//! Two numbering schemes coexist here and must not be mixed up:
//! - the filesystem transaction id, which orders snapshots and windows diffs;
//! - the commit id, a sequence number read from the snapshot's directory name,
//!   which is what users type.

pub mod changes;
pub mod select;

pub use changes::{changed_paths, qualifying_paths};
pub use select::{select, select_by_id, select_exact, Selection};

use crate::backend::{SnapshotBackend, SubvolumeEntry};
use crate::error::Result;
use crate::logger::Logger;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Diff base of the oldest snapshot: compare against an empty history.
pub const EMPTY_BASE: u64 = 0;

/// One commit: a snapshot subvolume and its place in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Absolute path of the snapshot root
    pub path: PathBuf,

    /// Transaction id of the filesystem state captured by the snapshot
    pub transaction: u64,

    /// Transaction of the next-older snapshot, or `EMPTY_BASE` for the oldest
    pub previous_transaction: u64,

    /// Sequence number from the name of the directory holding the snapshot
    pub commit: Option<u64>,

    /// ISO-8601 creation time, once known.
    ///
    /// `write_log` sets it on its copy of a commit that produces output;
    /// [`History::creation_time`] returns it instead of asking the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
}

impl Snapshot {
    pub fn new(path: PathBuf, transaction: u64, previous_transaction: u64) -> Self {
        let commit = parse_commit_id(&path);
        Snapshot {
            path,
            transaction,
            previous_transaction,
            commit,
            creation_time: None,
        }
    }

    /// True if the snapshot can be addressed by commit id
    pub fn is_commit(&self) -> bool {
        self.commit.is_some()
    }
}

/// Read the commit id from the directory containing the snapshot root.
///
/// `/.snapshots/42/snapshot` is commit 42; a non-numeric directory gives `None`.
pub fn parse_commit_id(path: &Path) -> Option<u64> {
    path.parent()?.file_name()?.to_str()?.parse().ok()
}

/// Sort subvolumes newest first and pair each with the next-older transaction.
///
/// Transactions compare as integers. The oldest snapshot gets `EMPTY_BASE`.
pub fn order_snapshots(mut entries: Vec<SubvolumeEntry>) -> Vec<Snapshot> {
    entries.sort_by(|a, b| b.transaction.cmp(&a.transaction));

    let bases: Vec<u64> = entries
        .iter()
        .skip(1)
        .map(|entry| entry.transaction)
        .chain(std::iter::once(EMPTY_BASE))
        .collect();

    entries
        .into_iter()
        .zip(bases)
        .map(|(entry, base)| Snapshot::new(entry.path, entry.transaction, base))
        .collect()
}

/// The ordered snapshot history of one mount, loaded fresh from the backend.
pub struct History<B: SnapshotBackend> {
    backend: B,
    mount: PathBuf,
    snapshots: Vec<Snapshot>,
}

impl<B: SnapshotBackend> History<B> {
    /// Enumerate and order every subvolume under `mount`
    pub fn load(backend: B, mount: &Path, logger: &Logger) -> Result<Self> {
        let entries = backend.list_subvolumes(mount)?;
        let snapshots = order_snapshots(entries);
        logger.debug(&format!(
            "{} subvolumes under {}, {} addressable as commits",
            snapshots.len(),
            mount.display(),
            snapshots.iter().filter(|s| s.is_commit()).count()
        ));
        Ok(History {
            backend,
            mount: mount.to_path_buf(),
            snapshots,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Every subvolume, newest first, including those without a commit id
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Commit-addressable snapshots, newest first
    pub fn commits(&self) -> Vec<&Snapshot> {
        self.snapshots.iter().filter(|s| s.is_commit()).collect()
    }

    /// Creation time of `snapshot`, asking the backend only if not yet known
    pub fn creation_time(&self, snapshot: &Snapshot) -> Result<String> {
        match &snapshot.creation_time {
            Some(stamp) => Ok(stamp.clone()),
            None => self.backend.creation_time(&snapshot.path),
        }
    }
}
