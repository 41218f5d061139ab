//! Copy entries between index backends.

use super::{sorted_by_location, IndexBackend, IndexEntry};
use crate::error::IndexError;
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of a migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries written to the target
    pub copied: usize,
    /// Entries whose fingerprint the target already had
    pub skipped: usize,
}

/// Copy every entry of `source` into `target`, then flush the target.
///
/// Fingerprints already present in the target keep their existing entry.
pub fn migrate(
    source: &mut dyn IndexBackend,
    target: &mut dyn IndexBackend,
) -> Result<MigrationReport, IndexError> {
    info!(
        "migrating index {} -> {}",
        source.location().display(),
        target.location().display()
    );

    let mut merged = target.load()?;
    let mut known: HashSet<String> = merged.iter().map(|e| e.fingerprint.clone()).collect();
    let mut report = MigrationReport::default();

    for entry in source.load()? {
        if !known.insert(entry.fingerprint.clone()) {
            warn!(
                "{} already indexed in target, skipping {}/{}",
                entry.fingerprint, entry.directory, entry.filename
            );
            report.skipped += 1;
            continue;
        }
        target.insert(&entry)?;
        merged.push(entry);
        report.copied += 1;
    }

    let refs: Vec<&IndexEntry> = sorted_by_location(merged.iter());
    target.flush(&refs)?;

    info!(
        "migration finished: {} copied, {} skipped",
        report.copied, report.skipped
    );
    Ok(report)
}
