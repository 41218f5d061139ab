//! # Scanner Module
//!
//! Discovers candidate media files in inbox directories.
//!
//! Hidden entries and excluded subtrees (typically the output directory
//! when it lives inside an inbox) are never entered. Results are sorted by
//! path so a run handles files in a stable order.
//!
//! ## Example
//! ```rust,ignore
//! use photo_inbox_sorter::core::scanner::{MediaScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default().excluding("/library"));
//! let found = scanner.scan(&["/inbox".into()])?;
//! ```

mod filter;
mod walker;

pub use filter::MediaFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::core::media::FileType;
use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A discovered candidate file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Declared type from the extension
    pub file_type: FileType,
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Discovered files, sorted by path
    pub files: Vec<MediaFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for file scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait MediaScanner: Send + Sync {
    /// Scan directories and return discovered files
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(&self, paths: &[PathBuf], events: &EventSender) -> Result<ScanResult, ScanError>;
}
