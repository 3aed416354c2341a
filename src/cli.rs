use clap::{Parser, Subcommand};
use snaplog::backend::{BtrfsBackend, SnapshotBackend};
use snaplog::config::Config;
use snaplog::copy::{copy_out, historical_path, Destination};
use snaplog::error::Result;
use snaplog::history::{self, select_by_id, History, Selection};
use snaplog::logger::Logger;
use snaplog::mount::{self, normalize};
use snaplog::render::{write_log, write_volumes, LogOptions, OutputFormat};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "snaplog")]
#[command(about = "Browse btrfs snapshots as if they were git commits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format: "human" or "json"
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Mount table to resolve mount points from
    #[arg(long, global = true)]
    pub mounts: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the commits that changed a file or directory
    Log {
        /// Path to operate on
        #[arg(default_value = ".")]
        path: String,

        /// Show what changed in this snapshot (regular expression searched in its path)
        commit: Option<String>,

        /// Do not list changed files, one line per commit
        #[arg(long)]
        no_files: bool,

        /// Show the matched commit and every older one
        #[arg(long, requires = "commit", conflicts_with = "single")]
        all: bool,

        /// Show just the matched commit (default)
        #[arg(long, requires = "commit")]
        single: bool,
    },

    /// List every subvolume under the mount owning a path
    Volumes {
        /// Path whose mount is listed
        path: String,
    },

    /// Retrieve a file or directory as it was at a commit
    Copy {
        /// Path of the file or directory today
        path: String,

        /// Commit id
        commit: u64,

        /// Destination; omit or use "-" to write a file to stdout
        target: Option<String>,
    },
}

/// Resolve the mount owning `target` and load its history
fn load_history<'b, B: SnapshotBackend>(
    config: &Config,
    backend: &'b B,
    target: &Path,
    logger: &Logger,
) -> Result<History<&'b B>> {
    let mount = mount::resolve(config.get_mounts_path(), target, logger)?;
    History::load(backend, &mount, logger)
}

fn absolute(path: &str) -> Result<PathBuf> {
    Ok(normalize(Path::new(path), &env::current_dir()?))
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if cli.debug {
        config.set_log_level("debug".to_string());
    }
    if let Some(format) = cli.format {
        config.set_output_format(format);
    }
    if let Some(mounts) = cli.mounts {
        config.set_mounts_path(PathBuf::from(mounts));
    }

    let logger = Logger::new(config.level_filter()?).install();
    logger.debug("Starting");

    let format: OutputFormat = config.get_output_format().parse()?;
    let backend = BtrfsBackend::new(&config, logger);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Log {
            path,
            commit,
            no_files,
            all,
            single: _,
        } => {
            let target = absolute(&path)?;
            let history = load_history(&config, &backend, &target, &logger)?;

            let selection = match commit {
                None => Selection::All,
                Some(expr) if all => Selection::Since(expr),
                Some(expr) => Selection::Single(expr),
            };
            let commits = history.commits();
            let selected = history::select(&commits, &selection)?;

            let options = LogOptions {
                target: &target,
                no_files,
                format,
            };
            let written = write_log(&history, &selected, options, &mut out, &logger)?;
            logger.debug(&format!("{} records from {} commits", written, selected.len()));
            Ok(())
        }

        Commands::Volumes { path } => {
            let target = absolute(&path)?;
            let history = load_history(&config, &backend, &target, &logger)?;
            write_volumes(history.snapshots(), format, &mut out)?;
            Ok(())
        }

        Commands::Copy {
            path,
            commit,
            target,
        } => {
            let live = absolute(&path)?;
            let history = load_history(&config, &backend, &live, &logger)?;
            let commits = history.commits();
            let snapshot = select_by_id(&commits, commit)?;

            let source = historical_path(history.mount(), &snapshot.path, &live)?;
            logger.debug(&format!("{} at commit {} is {}", live.display(), commit, source.display()));

            let destination = Destination::parse(target.as_deref());
            copy_out(&source, &snapshot.path, &destination, &mut out, &logger)?;
            Ok(())
        }
    }
}
