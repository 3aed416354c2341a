//! Retrieving a historical copy of a file or directory from a snapshot.

use crate::error::{Error, Result};
use crate::logger::Logger;
use std::fs::{self, File, FileTimes, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where `copy` sends the historical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Stream the bytes of a regular file to the caller
    Stdout,
    /// Recursive, metadata-preserving copy to a path
    Path(PathBuf),
}

impl Destination {
    /// `None` and `-` mean stdout
    pub fn parse(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") => Destination::Stdout,
            Some(path) => Destination::Path(PathBuf::from(path)),
        }
    }
}

/// Location of `target` inside `snapshot`: the mount prefix is replaced by the snapshot root.
pub fn historical_path(mount: &Path, snapshot: &Path, target: &Path) -> Result<PathBuf> {
    let relative = target
        .strip_prefix(mount)
        .map_err(|_| Error::NoMountFound(target.to_path_buf()))?;
    if relative.as_os_str().is_empty() {
        Ok(snapshot.to_path_buf())
    } else {
        Ok(snapshot.join(relative))
    }
}

/// Send `source` (a path inside `snapshot`) to `destination`.
///
/// Returns the number of bytes streamed, or the number of entries copied.
pub fn copy_out<W: Write>(
    source: &Path,
    snapshot: &Path,
    destination: &Destination,
    out: &mut W,
    logger: &Logger,
) -> Result<u64> {
    let meta = match fs::symlink_metadata(source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotInSnapshot {
                path: source.to_path_buf(),
                snapshot: snapshot.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    match destination {
        Destination::Stdout => {
            if !meta.is_file() {
                return Err(Error::StreamingDirectoryUnsupported(source.to_path_buf()));
            }
            let mut file = File::open(source)?;
            let bytes = io::copy(&mut file, out)?;
            out.flush()?;
            logger.debug(&format!("streamed {} bytes from {}", bytes, source.display()));
            Ok(bytes)
        }
        Destination::Path(dest) => copy_tree(source, dest, logger),
    }
}

/// Recursively copy `source` to `dest`, keeping permissions, timestamps and symlinks.
///
/// Like `cp -a`: an existing directory at `dest` receives the copy under the
/// source's file name. Ownership is not copied.
pub fn copy_tree(source: &Path, dest: &Path, logger: &Logger) -> Result<u64> {
    let root = match (dest.is_dir(), source.file_name()) {
        (true, Some(name)) => dest.join(name),
        _ => dest.to_path_buf(),
    };

    let mut copied = 0;
    // Directory metadata is applied last so read-only directories can still be filled.
    let mut directories: Vec<(PathBuf, Metadata)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = if relative.as_os_str().is_empty() {
            root.clone()
        } else {
            root.join(relative)
        };
        let meta = entry.path().symlink_metadata()?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            directories.push((target, meta));
        } else if file_type.is_file() {
            copy_file(entry.path(), &target, &meta)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            logger.warn(&format!("skipping special file {}", entry.path().display()));
            continue;
        }
        copied += 1;
    }

    for (dir, meta) in directories.iter().rev() {
        File::open(dir)?.set_times(file_times(meta)?)?;
        fs::set_permissions(dir, meta.permissions())?;
    }

    logger.debug(&format!("copied {} entries from {} to {}", copied, source.display(), root.display()));
    Ok(copied)
}

/// Remove a file or symlink already at `target`, so writing never follows a link.
fn clear_destination(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => Ok(fs::remove_file(target)?),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn copy_file(source: &Path, target: &Path, meta: &Metadata) -> Result<()> {
    let mut reader = File::open(source)?;
    clear_destination(target)?;
    let mut writer = File::create_new(target)?;
    io::copy(&mut reader, &mut writer)?;
    writer.set_times(file_times(meta)?)?;
    drop(writer);
    fs::set_permissions(target, meta.permissions())?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(source)?;
    clear_destination(target)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _target: &Path) -> Result<()> {
    Err(Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot copy symlink {}", source.display()),
    )))
}

fn file_times(meta: &Metadata) -> Result<FileTimes> {
    Ok(FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?))
}
