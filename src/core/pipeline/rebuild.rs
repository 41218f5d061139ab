//! Regenerating the index from what is already filed in the library.

use super::grouping::{Grouped, UnitGrouper};
use crate::core::index::DuplicateIndex;
use crate::core::metadata::{ExifReader, MetadataSource};
use crate::core::scanner::{MediaScanner, ScanConfig, WalkDirScanner};
use crate::error::SorterError;
use crate::events::{null_sender, EventSender, RunEvent, RunPhase, RunProgress, UnitEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Counts for one rebuild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub files_seen: usize,
    pub units: usize,
    /// Units newly recorded
    pub indexed: usize,
    /// Units whose fingerprint already pointed at their own location
    pub unchanged: usize,
    /// Units sharing a fingerprint with an earlier entry
    pub duplicates: usize,
    pub ambiguous: usize,
    /// Units that could not be fingerprinted
    pub skipped: usize,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct RebuildResult {
    pub summary: RebuildSummary,
    pub errors: Vec<String>,
}

/// Walks the output root and records every unit found there
pub struct IndexRebuilder {
    scan_config: ScanConfig,
    metadata: Box<dyn MetadataSource>,
}

impl IndexRebuilder {
    pub fn new() -> Self {
        Self {
            scan_config: ScanConfig::default(),
            metadata: Box::new(ExifReader),
        }
    }

    /// Skip a subtree of the library, typically an inbox living inside it
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.scan_config.exclude.push(path.into());
        self
    }

    pub fn metadata(mut self, metadata: Box<dyn MetadataSource>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn run(&self, index: &mut DuplicateIndex) -> Result<RebuildResult, SorterError> {
        self.run_with_events(index, &null_sender())
    }

    /// Record every unit under the index's output root.
    ///
    /// Entries already in the index win; a unit whose fingerprint is taken
    /// by another location is reported as a duplicate and left unrecorded.
    pub fn run_with_events(
        &self,
        index: &mut DuplicateIndex,
        events: &EventSender,
    ) -> Result<RebuildResult, SorterError> {
        let start_time = Instant::now();
        let mut summary = RebuildSummary::default();
        let mut errors = Vec::new();
        let mut grouper = UnitGrouper::new();

        events.run(RunEvent::Started { dry_run: false });
        events.run(RunEvent::PhaseChanged {
            phase: RunPhase::Scanning,
        });

        let root = index.output_root().to_path_buf();
        let scanner = WalkDirScanner::new(self.scan_config.clone());
        let scan_result = scanner.scan_with_events(&[root.clone()], events)?;
        errors.extend(scan_result.errors.iter().map(|e| e.to_string()));

        let total = scan_result.files.len();
        summary.files_seen = total;
        info!("rebuilding index from {} files under {}", total, root.display());

        events.run(RunEvent::PhaseChanged {
            phase: RunPhase::Indexing,
        });

        for (i, file) in scan_result.files.iter().enumerate() {
            events.run(RunEvent::Progress(RunProgress {
                processed: i + 1,
                total,
                current_path: file.path.clone(),
            }));
            let Some(Grouped { mut unit, ambiguous }) = grouper.unit_for(&file.path, events) else {
                continue;
            };
            if ambiguous {
                summary.ambiguous += 1;
            }
            summary.units += 1;

            let path = unit.primary_path().to_path_buf();
            let fingerprint = match unit.fingerprint(self.metadata.as_ref()) {
                Ok(fingerprint) => fingerprint.to_string(),
                Err(e) => {
                    error!("skipping {}: {}", path.display(), e);
                    errors.push(e.to_string());
                    events.unit(UnitEvent::Skipped {
                        path,
                        reason: e.to_string(),
                    });
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Some(hit) = index.lookup(&fingerprint) {
                if same_file(&hit.path, &path) {
                    summary.unchanged += 1;
                    continue;
                }
                warn!(
                    "{} duplicates {} (fingerprint {}), not indexed",
                    path.display(),
                    hit.path.display(),
                    fingerprint
                );
                events.unit(UnitEvent::Duplicate {
                    path,
                    existing: hit.path,
                    fingerprint,
                    verified: false,
                });
                summary.duplicates += 1;
                continue;
            }

            if let Err(e) = index.record(unit.directory(), &unit.filename(), unit.kind().as_str(), &fingerprint) {
                events.run(RunEvent::Error {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
            info!("indexed {}", path.display());
            events.unit(UnitEvent::Indexed { path, fingerprint });
            summary.indexed += 1;
        }

        events.run(RunEvent::PhaseChanged {
            phase: RunPhase::Flushing,
        });
        if let Err(e) = index.flush() {
            events.run(RunEvent::Error {
                message: e.to_string(),
            });
            return Err(e.into());
        }

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "rebuild finished: {} indexed, {} unchanged, {} duplicates, {} skipped",
            summary.indexed, summary.unchanged, summary.duplicates, summary.skipped
        );
        Ok(RebuildResult { summary, errors })
    }
}

impl Default for IndexRebuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
