//! Output for the `log` and `volumes` commands.
//!
//! Records are written as soon as they are known and the writer is flushed
//! after each one, so a consumer sees the newest commits first and can stop
//! reading early; a failed write ends the scan before any further backend call.

use crate::backend::SnapshotBackend;
use crate::error::{Error, Result};
use crate::history::{changed_paths, qualifying_paths, History, Snapshot};
use crate::logger::Logger;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Space separated fields, one record per line
    Human,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Config(format!("Unknown output format: {}", other))),
        }
    }
}

/// One line of `log` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub creation_time: String,
    pub commit: Option<u64>,
    pub snapshot: PathBuf,
    /// Changed file, absent in `--no-files` mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.creation_time, display_commit(self.commit), self.snapshot.display())?;
        if let Some(file) = &self.file {
            write!(f, " {}", file.display())?;
        }
        Ok(())
    }
}

fn display_commit(commit: Option<u64>) -> String {
    commit.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

fn emit<W: Write, T: Serialize + fmt::Display>(out: &mut W, format: OutputFormat, record: &T) -> Result<()> {
    match format {
        OutputFormat::Human => writeln!(out, "{}", record)?,
        OutputFormat::Json => {
            let line = serde_json::to_string(record).map_err(std::io::Error::from)?;
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Options of a `log` run
#[derive(Debug, Clone, Copy)]
pub struct LogOptions<'a> {
    /// Only changes at or below this path are reported
    pub target: &'a Path,
    /// One record per commit instead of one per changed file
    pub no_files: bool,
    pub format: OutputFormat,
}

/// Write the change log of `commits` (newest first). Returns the number of records.
pub fn write_log<B: SnapshotBackend, W: Write>(
    history: &History<B>,
    commits: &[&Snapshot],
    options: LogOptions<'_>,
    out: &mut W,
    logger: &Logger,
) -> Result<usize> {
    let mut written = 0;

    for commit in commits {
        let changed = changed_paths(history.backend(), history.mount(), commit, logger)?;
        let mut hits = qualifying_paths(&changed, options.target).peekable();
        if hits.peek().is_none() {
            logger.debug(&format!("{} does not touch {}", commit.path.display(), options.target.display()));
            continue;
        }

        let mut snapshot = (*commit).clone();
        snapshot.creation_time = Some(history.creation_time(&snapshot)?);
        let record = |file: Option<&PathBuf>| LogRecord {
            creation_time: snapshot.creation_time.clone().unwrap_or_default(),
            commit: snapshot.commit,
            snapshot: snapshot.path.clone(),
            file: file.cloned(),
        };

        if options.no_files {
            emit(out, options.format, &record(None))?;
            written += 1;
            continue;
        }

        for path in hits {
            emit(out, options.format, &record(Some(path)))?;
            written += 1;
        }
    }

    Ok(written)
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.path.display(),
            self.transaction,
            self.previous_transaction,
            display_commit(self.commit)
        )
    }
}

/// List every subvolume: path, transaction, diff base and commit id.
pub fn write_volumes<W: Write>(snapshots: &[Snapshot], format: OutputFormat, out: &mut W) -> Result<usize> {
    for snapshot in snapshots {
        emit(out, format, snapshot)?;
    }
    Ok(snapshots.len())
}
