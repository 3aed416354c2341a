//! Change sets: which files a commit touched.

use crate::backend::SnapshotBackend;
use crate::error::Result;
use crate::history::Snapshot;
use crate::logger::Logger;
use crate::mount::is_subpath;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Files changed by `snapshot` relative to its diff base, as live filesystem paths.
///
/// The backend reports paths inside the snapshot; they are re-rooted under
/// `mount` so they compare directly with user paths. A file with several
/// changed extents is listed once, at its first occurrence.
pub fn changed_paths<B: SnapshotBackend>(
    backend: &B,
    mount: &Path,
    snapshot: &Snapshot,
    logger: &Logger,
) -> Result<Vec<PathBuf>> {
    logger.debug(&format!(
        "changes in {} between transactions {} and {}",
        snapshot.path.display(),
        snapshot.previous_transaction,
        snapshot.transaction
    ));

    let relative = backend.find_changed_paths(&snapshot.path, snapshot.previous_transaction)?;

    let mut seen = HashSet::new();
    let paths = relative
        .into_iter()
        .map(|path| mount.join(path.strip_prefix("/").unwrap_or(&path)))
        .filter(|path| seen.insert(path.clone()))
        .collect();
    Ok(paths)
}

/// The changed paths at or below `target`.
pub fn qualifying_paths<'a>(
    changed: &'a [PathBuf],
    target: &'a Path,
) -> impl Iterator<Item = &'a PathBuf> + 'a {
    changed.iter().filter(move |path| is_subpath(target, path))
}
