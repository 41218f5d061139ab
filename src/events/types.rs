//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted while sorting an inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Discovery of candidate files
    Scan(ScanEvent),
    /// What happened to one unit
    Unit(UnitEvent),
    /// Run-level events
    Run(RunEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { paths: Vec<PathBuf> },
    /// Progress update during scanning
    Progress(ScanProgress),
    /// An entry could not be read but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed { total_files: usize },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories scanned so far
    pub directories_scanned: usize,
    /// Number of media files found so far
    pub files_found: usize,
    /// Current directory being scanned
    pub current_path: PathBuf,
}

/// Outcome of handling one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UnitEvent {
    /// Moved into the tree and indexed
    Filed {
        kind: String,
        from: PathBuf,
        to: PathBuf,
        fingerprint: String,
    },
    /// Dry run: where the unit would go
    WouldFile {
        kind: String,
        from: PathBuf,
        to: PathBuf,
    },
    /// Already indexed; left where it is
    Duplicate {
        path: PathBuf,
        existing: PathBuf,
        fingerprint: String,
        /// Whether the bytes matched the filed copy
        verified: bool,
    },
    /// Recorded by an index rebuild
    Indexed { path: PathBuf, fingerprint: String },
    /// More than two files share the stem; each is handled on its own
    Ambiguous { path: PathBuf, siblings: Vec<PathBuf> },
    /// Could not be fingerprinted
    Skipped { path: PathBuf, reason: String },
    /// Could not be placed
    Failed { path: PathBuf, message: String },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Run has started
    Started { dry_run: bool },
    /// Moving to a new phase
    PhaseChanged { phase: RunPhase },
    /// One more file handled
    Progress(RunProgress),
    /// Run completed; the index is flushed
    Completed { summary: SortSummary },
    /// Run aborted
    Error { message: String },
}

/// Phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Scanning,
    Sorting,
    Indexing,
    Flushing,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Scanning => write!(f, "Scanning"),
            RunPhase::Sorting => write!(f, "Sorting"),
            RunPhase::Indexing => write!(f, "Indexing"),
            RunPhase::Flushing => write!(f, "Writing index"),
        }
    }
}

/// Progress through the discovered files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub processed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSummary {
    /// Candidate files discovered
    pub files_seen: usize,
    /// Units handled (a composite counts once)
    pub units: usize,
    /// Units moved and indexed (or that would be, in a dry run)
    pub filed: usize,
    /// Units already in the index
    pub duplicates: usize,
    /// Duplicates whose bytes differ from the filed copy
    pub collisions: usize,
    /// Files that were part of an ambiguous same-stem group
    pub ambiguous: usize,
    /// Units that could not be fingerprinted
    pub skipped: usize,
    /// Units that could not be placed
    pub failed: usize,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl SortSummary {
    /// Whether every unit was filed or recognized
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failed == 0
    }
}
