//! Mount point resolution: which mounted filesystem (and so which snapshot
//! history) governs a given path.

use crate::error::{Error, Result};
use crate::logger::Logger;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against `cwd` and resolve `.`/`..` lexically.
///
/// Symlinks are not followed, so this works for paths that no longer exist.
pub fn normalize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// True if `path` equals `prefix` or lies beneath it.
///
/// Comparison is per path component: `/foo` is not a prefix of `/foobar`.
pub fn is_subpath(prefix: &Path, path: &Path) -> bool {
    path.starts_with(prefix)
}

/// Pick the mount point with the longest component prefix of `target`.
pub fn find_mount(mounts: &[PathBuf], target: &Path) -> Result<PathBuf> {
    mounts
        .iter()
        .filter(|mount| mount.is_absolute() && is_subpath(mount, target))
        .max_by_key(|mount| mount.components().count())
        .map(|mount| mount.components().collect())
        .ok_or_else(|| Error::NoMountFound(target.to_path_buf()))
}

/// Extract absolute mount points from a `/proc/mounts`-style table.
pub fn parse_mount_table(table: &str) -> Vec<PathBuf> {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_mount_field)
        .filter(|mount| mount.starts_with('/'))
        .map(PathBuf::from)
        .collect()
}

/// Read and parse the mount table at `path`
pub fn read_mount_points(path: &Path, logger: &Logger) -> Result<Vec<PathBuf>> {
    let table = fs::read_to_string(path)?;
    let mounts = parse_mount_table(&table);
    logger.debug(&format!("{} mount points in {}", mounts.len(), path.display()));
    Ok(mounts)
}

/// Resolve the mount that owns `target` (already normalized).
pub fn resolve(mounts_path: &Path, target: &Path, logger: &Logger) -> Result<PathBuf> {
    let mounts = read_mount_points(mounts_path, logger)?;
    let mount = find_mount(&mounts, target)?;
    logger.debug(&format!("{} is under mount {}", target.display(), mount.display()));
    Ok(mount)
}

// The kernel writes space, tab, newline and backslash as 3-digit octal escapes.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value = bytes[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|b| (b'0'..=b'7').contains(b))
}
