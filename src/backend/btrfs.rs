use crate::backend::parse::{self, reroot};
use crate::backend::{SnapshotBackend, SubvolumeEntry};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger::Logger;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Snapshot backend that shells out to the `btrfs` command line tool.
///
/// Arguments are passed directly to the process (no shell), so paths need no quoting.
pub struct BtrfsBackend {
    program: String,
    logger: Logger,
}

impl BtrfsBackend {
    /// Create a backend using the program configured in `config`
    pub fn new(config: &Config, logger: Logger) -> Self {
        BtrfsBackend::with_program(config.get_btrfs_program(), logger)
    }

    pub fn with_program(program: impl Into<String>, logger: Logger) -> Self {
        BtrfsBackend {
            program: program.into(),
            logger,
        }
    }

    /// Run `btrfs <args>` and return its stdout, undecoded
    fn run(&self, args: &[&OsStr]) -> Result<Vec<u8>> {
        self.logger.debug(&format!(
            "running {} {}",
            self.program,
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        ));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::BackendCommand(format!("Failed to start {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(Error::BackendCommand(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl SnapshotBackend for BtrfsBackend {
    fn list_subvolumes(&self, mount: &Path) -> Result<Vec<SubvolumeEntry>> {
        let output = self.run(&[
            OsStr::new("subvolume"),
            OsStr::new("list"),
            mount.as_os_str(),
        ])?;

        let entries = parse::parse_subvolume_list(&output)?
            .into_iter()
            .map(|entry| SubvolumeEntry {
                path: reroot(mount, &entry.path),
                transaction: entry.transaction,
            })
            .collect::<Vec<_>>();

        self.logger.debug(&format!("{} subvolumes under {}", entries.len(), mount.display()));
        Ok(entries)
    }

    fn creation_time(&self, snapshot: &Path) -> Result<String> {
        let output = self.run(&[
            OsStr::new("subvolume"),
            OsStr::new("show"),
            snapshot.as_os_str(),
        ])?;
        parse::parse_creation_time(&String::from_utf8_lossy(&output), snapshot)
    }

    fn find_changed_paths(&self, snapshot: &Path, base_transaction: u64) -> Result<Vec<PathBuf>> {
        let base = base_transaction.to_string();
        let output = self.run(&[
            OsStr::new("subvolume"),
            OsStr::new("find-new"),
            snapshot.as_os_str(),
            OsStr::new(&base),
        ])?;

        let extents = parse::parse_find_new(&output)?;
        self.logger.debug(&format!(
            "{} extents changed in {} since transaction {}",
            extents.len(),
            snapshot.display(),
            base_transaction
        ));
        Ok(extents.into_iter().map(|extent| extent.path).collect())
    }
}
