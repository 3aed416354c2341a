use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No mount point contains {0}")]
    NoMountFound(PathBuf),

    #[error("No commit matches {0:?}")]
    NoSuchCommit(String),

    #[error("Commit reference {reference:?} matches {count} commits")]
    AmbiguousCommit { reference: String, count: usize },

    #[error("Creation time unavailable for {0}")]
    MetadataUnavailable(PathBuf),

    #[error("Unexpected `{query}` output at line {line_no}: {line:?}")]
    BackendParseError {
        query: &'static str,
        line_no: usize,
        line: String,
    },

    #[error("Cannot stream {0}: not a regular file (give a destination to copy it)")]
    StreamingDirectoryUnsupported(PathBuf),

    #[error("{path} does not exist in snapshot {snapshot}")]
    NotInSnapshot { path: PathBuf, snapshot: PathBuf },

    #[error("Invalid commit expression: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Backend command failed: {0}")]
    BackendCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the consumer of our output went away (e.g. `snaplog log | head`).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
