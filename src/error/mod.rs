//! # Error Module
//!
//! Error types for the inbox sorter.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths and fingerprints, so a skipped file can be fixed by hand
//! - **Per-unit vs. per-run** - classification, hashing and placement errors skip one
//!   unit; index errors abort the run

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum SorterError {
    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while grouping a file with its same-stem siblings
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Ambiguous group of {} files for {stem}, treating each file on its own", siblings.len())]
    Ambiguous { stem: PathBuf, siblings: Vec<PathBuf> },
}

/// Errors that occur while fingerprinting a unit
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur in the duplicate index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Fingerprint {fingerprint} is already indexed as {existing}")]
    DuplicateKey {
        fingerprint: String,
        existing: PathBuf,
    },

    #[error("Index at {path} is unreadable: {reason}. Restore the .bak copy or rebuild the index.")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Index I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index query failed: {0}")]
    Query(String),

    #[error("{path} is not inside the output directory {root}")]
    OutsideOutputRoot { path: PathBuf, root: PathBuf },
}

/// Errors that occur while moving a unit into the dated tree
#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to overwrite existing file {path}")]
    TargetExists { path: PathBuf },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid naming pattern {pattern:?}: {reason}")]
    InvalidFormat { pattern: String, reason: String },

    #[error(
        "Sidecar moved to {sidecar} but media {media} could not follow: {source}. Move it next to the sidecar by hand."
    )]
    PartialComposite {
        sidecar: PathBuf,
        media: PathBuf,
        #[source]
        source: Box<PlacementError>,
    },

    #[error("Failed to read capture time of {path}: {source}")]
    CaptureTime {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while enumerating inbox directories
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, SorterError>;
