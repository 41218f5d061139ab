//! The filing run: scan, classify, fingerprint, deduplicate, place, record.

use crate::core::index::{DuplicateIndex, IndexHit};
use super::grouping::{Grouped, UnitGrouper};
use crate::core::media::MediaUnit;
use crate::core::metadata::{ExifReader, MetadataSource};
use crate::core::placement::{PlacementConfig, Placer};
use crate::core::scanner::{MediaScanner, ScanConfig, WalkDirScanner};
use crate::error::{IndexError, PlacementError, SorterError};
use crate::events::{null_sender, EventSender, RunEvent, RunPhase, RunProgress, SortSummary, UnitEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Result of a run
#[derive(Debug)]
pub struct SortResult {
    pub summary: SortSummary,
    /// Per-unit problems, for the final report
    pub errors: Vec<String>,
}

/// Configuration for a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Inbox directories
    pub sources: Vec<PathBuf>,
    pub placement: PlacementConfig,
    pub scan_config: ScanConfig,
    /// Decide everything but move nothing and leave the index alone
    pub dry_run: bool,
}

/// Builder for a [`Sorter`]
pub struct SorterBuilder {
    config: RunConfig,
    metadata: Option<Box<dyn MetadataSource>>,
}

impl SorterBuilder {
    /// Start a builder filing into `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfig {
                sources: Vec::new(),
                placement: PlacementConfig::new(output_root),
                scan_config: ScanConfig::default(),
                dry_run: false,
            },
            metadata: None,
        }
    }

    /// Set the inbox directories
    pub fn sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.config.sources = sources;
        self
    }

    /// Add one inbox directory
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.config.sources.push(source.into());
        self
    }

    /// Replace the whole placement configuration
    pub fn placement(mut self, placement: PlacementConfig) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn directory_format(mut self, format: impl Into<String>) -> Self {
        self.config.placement.directory_format = format.into();
        self
    }

    pub fn filename_format(mut self, format: Option<String>) -> Self {
        self.config.placement.filename_format = format.filter(|f| !f.is_empty());
        self
    }

    pub fn file_mode(mut self, mode: u32) -> Self {
        self.config.placement.file_mode = mode;
        self
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.config.scan_config = config;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.scan_config.include_hidden = include;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Use another source of embedded capture times
    pub fn metadata(mut self, metadata: Box<dyn MetadataSource>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build the sorter, validating the naming patterns
    pub fn build(self) -> Result<Sorter, SorterError> {
        if self.config.sources.is_empty() {
            return Err(SorterError::Config("no source directories given".to_string()));
        }

        let mut config = self.config;
        // The library may live inside an inbox; never re-sort it.
        config
            .scan_config
            .exclude
            .push(config.placement.output_root.clone());

        Ok(Sorter {
            placer: Placer::new(config.placement.clone())?,
            config,
            metadata: self.metadata.unwrap_or_else(|| Box::new(ExifReader)),
        })
    }
}

/// Files inbox media into the dated library
pub struct Sorter {
    config: RunConfig,
    placer: Placer,
    metadata: Box<dyn MetadataSource>,
}

/// What happened to one unit
enum Outcome {
    Filed,
    Duplicate { collision: bool },
    Skipped,
    Failed,
}

/// Mutable state of one run
#[derive(Default)]
struct RunState {
    /// Files already covered, and ambiguous groups seen so far
    grouper: UnitGrouper,
    /// Dry run only: fingerprint → first source path that would be filed
    planned: HashMap<String, PathBuf>,
    summary: SortSummary,
    errors: Vec<String>,
}

impl Sorter {
    /// Create a new sorter builder
    pub fn builder(output_root: impl Into<PathBuf>) -> SorterBuilder {
        SorterBuilder::new(output_root)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run without events
    pub fn run(&self, index: &mut DuplicateIndex) -> Result<SortResult, SorterError> {
        self.run_with_events(index, &null_sender())
    }

    /// Run with event reporting.
    ///
    /// Per-unit failures are logged, counted and reported; they never stop
    /// the run. Index write failures do, after which the index may be
    /// behind the filesystem.
    pub fn run_with_events(
        &self,
        index: &mut DuplicateIndex,
        events: &EventSender,
    ) -> Result<SortResult, SorterError> {
        let start_time = Instant::now();
        let mut state = RunState {
            summary: SortSummary {
                dry_run: self.config.dry_run,
                ..Default::default()
            },
            ..Default::default()
        };

        events.run(RunEvent::Started {
            dry_run: self.config.dry_run,
        });
        events.run(RunEvent::PhaseChanged {
            phase: RunPhase::Scanning,
        });

        let scanner = WalkDirScanner::new(self.config.scan_config.clone());
        let scan_result = scanner.scan_with_events(&self.config.sources, events)?;
        state
            .errors
            .extend(scan_result.errors.iter().map(|e| e.to_string()));

        let total = scan_result.files.len();
        state.summary.files_seen = total;
        info!("{} candidate files in {} inbox(es)", total, self.config.sources.len());

        events.run(RunEvent::PhaseChanged {
            phase: RunPhase::Sorting,
        });

        for (i, file) in scan_result.files.iter().enumerate() {
            events.run(RunEvent::Progress(RunProgress {
                processed: i + 1,
                total,
                current_path: file.path.clone(),
            }));

            if let Err(e) = self.sort_file(&file.path, index, &mut state, events) {
                events.run(RunEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        }

        if !self.config.dry_run {
            events.run(RunEvent::PhaseChanged {
                phase: RunPhase::Flushing,
            });
            if let Err(e) = index.flush() {
                events.run(RunEvent::Error {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        }

        state.summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "run finished: {} filed, {} duplicates, {} skipped, {} failed",
            state.summary.filed, state.summary.duplicates, state.summary.skipped, state.summary.failed
        );
        events.run(RunEvent::Completed {
            summary: state.summary.clone(),
        });

        Ok(SortResult {
            summary: state.summary,
            errors: state.errors,
        })
    }

    fn sort_file(
        &self,
        path: &Path,
        index: &mut DuplicateIndex,
        state: &mut RunState,
        events: &EventSender,
    ) -> Result<(), SorterError> {
        let Some(Grouped { mut unit, ambiguous }) = state.grouper.unit_for(path, events) else {
            return Ok(());
        };
        if ambiguous {
            state.summary.ambiguous += 1;
        }
        state.summary.units += 1;

        match self.sort_unit(&mut unit, index, state, events)? {
            Outcome::Filed => state.summary.filed += 1,
            Outcome::Duplicate { collision } => {
                state.summary.duplicates += 1;
                if collision {
                    state.summary.collisions += 1;
                }
            }
            Outcome::Skipped => state.summary.skipped += 1,
            Outcome::Failed => state.summary.failed += 1,
        }
        Ok(())
    }

    fn sort_unit(
        &self,
        unit: &mut MediaUnit,
        index: &mut DuplicateIndex,
        state: &mut RunState,
        events: &EventSender,
    ) -> Result<Outcome, SorterError> {
        let source = unit.primary_path().to_path_buf();

        let fingerprint = match unit.fingerprint(self.metadata.as_ref()) {
            Ok(fingerprint) => fingerprint.clone(),
            Err(e) => {
                error!("skipping {}: {}", source.display(), e);
                state.errors.push(e.to_string());
                events.unit(UnitEvent::Skipped {
                    path: source,
                    reason: e.to_string(),
                });
                return Ok(Outcome::Skipped);
            }
        };

        if let Some(hit) = index.lookup(fingerprint.as_str()) {
            return Ok(self.report_duplicate(unit, &hit, events));
        }
        if let Some(first) = state.planned.get(fingerprint.as_str()) {
            let hit_unit = MediaUnit::build_for(first);
            let collision = !unit.same_content_as(&hit_unit);
            warn!(
                "{} duplicates {}, which this run would file first",
                source.display(),
                first.display()
            );
            events.unit(UnitEvent::Duplicate {
                path: source,
                existing: first.clone(),
                fingerprint: fingerprint.to_string(),
                verified: !collision,
            });
            return Ok(Outcome::Duplicate { collision });
        }

        let captured = match unit.capture_time(self.metadata.as_ref()) {
            Ok(captured) => captured,
            Err(e) => {
                let e = PlacementError::CaptureTime {
                    path: source.clone(),
                    source: e,
                };
                return Ok(self.report_failure(&source, e.into(), state, events));
            }
        };

        if self.config.dry_run {
            return match self.placer.plan(unit, &captured) {
                Ok(placement) => {
                    info!("would file {} as {}", source.display(), placement.primary.display());
                    state.planned.insert(fingerprint.to_string(), source.clone());
                    events.unit(UnitEvent::WouldFile {
                        kind: unit.kind().to_string(),
                        from: source,
                        to: placement.primary,
                    });
                    Ok(Outcome::Filed)
                }
                Err(e) => Ok(self.report_failure(&source, e.into(), state, events)),
            };
        }

        let placement = match self.placer.place(unit, &captured) {
            Ok(placement) => placement,
            Err(e) => return Ok(self.report_failure(&source, e.into(), state, events)),
        };

        match index.record(
            &placement.directory,
            &placement.filename(),
            unit.kind().as_str(),
            fingerprint.as_str(),
        ) {
            Ok(_) => {}
            Err(e @ IndexError::DuplicateKey { .. }) => {
                warn!("{} was filed but not indexed: {}", placement.primary.display(), e);
            }
            Err(e) => {
                error!(
                    "{} was filed but the index could not record it: {}",
                    placement.primary.display(),
                    e
                );
                return Err(e.into());
            }
        }

        events.unit(UnitEvent::Filed {
            kind: unit.kind().to_string(),
            from: source,
            to: placement.primary,
            fingerprint: fingerprint.to_string(),
        });
        Ok(Outcome::Filed)
    }

    /// Log a duplicate and check the bytes against the filed copy.
    ///
    /// The fingerprint decides; a byte mismatch is reported as a hash
    /// collision but the unit is still left where it is.
    fn report_duplicate(&self, unit: &MediaUnit, hit: &IndexHit, events: &EventSender) -> Outcome {
        let source = unit.primary_path();
        let fingerprint = hit.entry.fingerprint.clone();

        let collision = if hit.path.exists() {
            let filed = MediaUnit::build_for(&hit.path);
            let identical = unit.same_content_as(&filed);
            if !identical {
                error!(
                    "hash collision: {} and {} share fingerprint {} but differ",
                    source.display(),
                    hit.path.display(),
                    fingerprint
                );
            }
            !identical
        } else {
            warn!("{} is indexed but missing from the library", hit.path.display());
            false
        };

        let duplicate = IndexError::DuplicateKey {
            fingerprint: fingerprint.clone(),
            existing: hit.path.clone(),
        };
        warn!("{}: {}", source.display(), duplicate);

        events.unit(UnitEvent::Duplicate {
            path: source.to_path_buf(),
            existing: hit.path.clone(),
            fingerprint,
            verified: !collision && hit.path.exists(),
        });
        Outcome::Duplicate { collision }
    }

    fn report_failure(
        &self,
        source: &Path,
        e: SorterError,
        state: &mut RunState,
        events: &EventSender,
    ) -> Outcome {
        error!("could not file {}: {}", source.display(), e);
        state.errors.push(e.to_string());
        events.unit(UnitEvent::Failed {
            path: source.to_path_buf(),
            message: e.to_string(),
        });
        Outcome::Failed
    }
}
