//! Parsers for the output of the `btrfs` command line tool.
//!
//! Each parser accepts a small fixed grammar: known marker lines are skipped,
//! data lines must match field by field, and anything else is reported as
//! `BackendParseError` with its line number. A line that fails to parse is
//! never dropped, since a silently shorter change list looks like a clean one.
//!
//! Output is taken as raw bytes: file names on Linux need not be UTF-8, and a
//! lossy decode would turn them into paths that exist nowhere.

use crate::backend::SubvolumeEntry;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use std::path::{Path, PathBuf};

pub const LIST_QUERY: &str = "subvolume list";
pub const SHOW_QUERY: &str = "subvolume show";
pub const FIND_NEW_QUERY: &str = "subvolume find-new";

/// One extent line of `btrfs subvolume find-new`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentLine {
    pub inode: u64,
    pub generation: u64,
    pub flags: String,
    /// Path relative to the subvolume root
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Keyword(&'static str),
    Number,
    Flags,
}

use Field::{Flags, Keyword, Number};

// inode <n> file offset <n> len <n> disk start <n> offset <n> gen <n> flags <flags> <path>
const EXTENT_FIELDS: [Field; 16] = [
    Keyword("inode"),
    Number,
    Keyword("file"),
    Keyword("offset"),
    Number,
    Keyword("len"),
    Number,
    Keyword("disk"),
    Keyword("start"),
    Number,
    Keyword("offset"),
    Number,
    Keyword("gen"),
    Number,
    Keyword("flags"),
    Flags,
];

const INODE_FIELD: usize = 1;
const GEN_FIELD: usize = 13;
const FLAGS_FIELD: usize = 15;

const PATH_KEY: &[u8] = b" path ";

fn parse_error(query: &'static str, index: usize, line: &[u8]) -> Error {
    Error::BackendParseError {
        query,
        line_no: index + 1,
        line: String::from_utf8_lossy(line).into_owned(),
    }
}

fn byte_lines(output: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    output
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .enumerate()
}

fn trim_bytes(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(OsStr::from_bytes(bytes)))
}

// Without byte-transparent paths, a non-UTF-8 name is a parse error rather than a lossy guess.
#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(bytes).ok().map(PathBuf::from)
}

/// Parse `btrfs subvolume list <mount>`.
///
/// Returned paths are relative to the mount, exactly as the tool prints them.
pub fn parse_subvolume_list(output: &[u8]) -> Result<Vec<SubvolumeEntry>> {
    let mut entries = Vec::new();

    for (index, line) in byte_lines(output) {
        if trim_bytes(line).is_empty() {
            continue;
        }
        let entry = parse_list_line(line).ok_or_else(|| parse_error(LIST_QUERY, index, line))?;
        entries.push(entry);
    }

    Ok(entries)
}

// ID <n> gen <n> [<key> <value>]... top level <n> path <path>
fn parse_list_line(line: &[u8]) -> Option<SubvolumeEntry> {
    let at = line.windows(PATH_KEY.len()).position(|w| w == PATH_KEY)?;
    let head = std::str::from_utf8(&line[..at]).ok()?;
    let path = &line[at + PATH_KEY.len()..];
    if path.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = head.split_whitespace().collect();
    if tokens.first() != Some(&"ID") {
        return None;
    }
    tokens.get(1)?.parse::<u64>().ok()?;

    let gen_at = tokens.iter().position(|t| *t == "gen")?;
    let transaction = tokens.get(gen_at + 1)?.parse::<u64>().ok()?;

    Some(SubvolumeEntry::new(path_from_bytes(path)?, transaction))
}

/// Extract the creation time from `btrfs subvolume show <snapshot>` as ISO-8601.
pub fn parse_creation_time(output: &str, snapshot: &Path) -> Result<String> {
    for (index, line) in output.lines().enumerate() {
        let Some(value) = line.trim().strip_prefix("Creation time:") else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "-" {
            return Err(Error::MetadataUnavailable(snapshot.to_path_buf()));
        }
        return iso_timestamp(value).ok_or_else(|| parse_error(SHOW_QUERY, index, line.as_bytes()));
    }

    Err(Error::MetadataUnavailable(snapshot.to_path_buf()))
}

fn iso_timestamp(value: &str) -> Option<String> {
    if let Ok(stamp) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Some(stamp.format("%Y-%m-%dT%H:%M:%S%:z").to_string());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|stamp| stamp.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Parse `btrfs subvolume find-new <snapshot> <base>`.
///
/// Blank lines, `#` and the `transid marker was <n>` trailer are markers.
pub fn parse_find_new(output: &[u8]) -> Result<Vec<ExtentLine>> {
    let mut extents = Vec::new();

    for (index, line) in byte_lines(output) {
        let trimmed = trim_bytes(line);
        if trimmed.is_empty() || trimmed == b"#" || is_transid_marker(trimmed) {
            continue;
        }
        let extent = parse_extent_line(line).ok_or_else(|| parse_error(FIND_NEW_QUERY, index, line))?;
        extents.push(extent);
    }

    Ok(extents)
}

fn is_transid_marker(line: &[u8]) -> bool {
    line.strip_prefix(b"transid marker was ".as_slice())
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .map(|rest| rest.trim().parse::<u64>().is_ok())
        .unwrap_or(false)
}

fn parse_extent_line(line: &[u8]) -> Option<ExtentLine> {
    // The path is whatever follows the fixed fields and may contain spaces.
    let pieces: Vec<&[u8]> = line.splitn(EXTENT_FIELDS.len() + 1, |b| *b == b' ').collect();
    if pieces.len() != EXTENT_FIELDS.len() + 1 {
        return None;
    }

    let fields = pieces[..EXTENT_FIELDS.len()]
        .iter()
        .map(|piece| std::str::from_utf8(piece).ok())
        .collect::<Option<Vec<&str>>>()?;

    for (field, value) in EXTENT_FIELDS.iter().zip(&fields) {
        let ok = match field {
            Keyword(word) => value == word,
            Number => value.parse::<u64>().is_ok(),
            Flags => !value.is_empty(),
        };
        if !ok {
            return None;
        }
    }

    let path = pieces[EXTENT_FIELDS.len()];
    if path.is_empty() {
        return None;
    }

    Some(ExtentLine {
        inode: fields[INODE_FIELD].parse().ok()?,
        generation: fields[GEN_FIELD].parse().ok()?,
        flags: fields[FLAGS_FIELD].to_string(),
        path: path_from_bytes(path)?,
    })
}

/// Join a tool-relative path onto `root`, tolerating a leading separator.
pub fn reroot(root: &Path, relative: &Path) -> PathBuf {
    root.join(relative.strip_prefix("/").unwrap_or(relative))
}
