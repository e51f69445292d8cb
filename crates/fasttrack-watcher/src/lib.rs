//! FastTrack Watcher - project scanning and live updates
//!
//! [`Scanner`] walks a project (honouring `.gitignore` and the configured
//! ignore list), tags AI-looking blocks and links tests to the blocks they
//! exercise. [`ProjectWatcher`] keeps a [`SharedGraph`] current as files
//! change and saves it after every batch.

mod error;
mod scanner;
mod watcher;

pub use error::{Result, WatchError};
pub use scanner::{analyze_file, scan_project, FileReport, ScanResult, Scanner};
pub use watcher::{ProjectWatcher, SharedGraph, WatchConfig, WatchUpdate};
