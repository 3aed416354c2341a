use crate::error::{Error, Result};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

/// Configuration for the snaplog CLI tool
///
/// Nothing is persisted: every invocation builds a fresh config from defaults,
/// the environment, then command-line flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level: "error", "warn", "info", "debug", "trace" (default: "warn")
    pub log_level: String,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Mount table to resolve mount points from (default: `/proc/mounts`)
    pub mounts_path: PathBuf,

    /// btrfs program to invoke (default: `btrfs`, looked up on PATH)
    pub btrfs_program: String,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Config {
            log_level: "warn".to_string(),
            output_format: "human".to_string(),
            mounts_path: PathBuf::from("/proc/mounts"),
            btrfs_program: "btrfs".to_string(),
        }
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Parse the configured level for the logger
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse::<LevelFilter>()
            .map_err(|_| Error::Config(format!("Unknown log level: {}", self.log_level)))
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    pub fn get_mounts_path(&self) -> &PathBuf {
        &self.mounts_path
    }

    pub fn set_mounts_path(&mut self, path: PathBuf) {
        self.mounts_path = path;
    }

    pub fn get_btrfs_program(&self) -> &str {
        &self.btrfs_program
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `SNAPLOG_LOG_LEVEL`: log level
    /// - `SNAPLOG_OUTPUT_FORMAT`: "human" or "json"
    /// - `SNAPLOG_MOUNTS`: alternative mount table
    /// - `SNAPLOG_BTRFS`: btrfs program path
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(level) = env::var("SNAPLOG_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("SNAPLOG_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(path) = env::var("SNAPLOG_MOUNTS") {
            config.mounts_path = PathBuf::from(path);
        }

        if let Ok(program) = env::var("SNAPLOG_BTRFS") {
            config.btrfs_program = program;
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
