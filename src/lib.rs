//! Browse the read-only snapshot subvolumes of a btrfs filesystem as a
//! git-like history: list commits, see which files a commit changed under a
//! path, and pull out a file or directory as it was at a given commit.

pub mod backend;
pub mod config;
pub mod copy;
pub mod error;
pub mod history;
pub mod logger;
pub mod mount;
pub mod render;
