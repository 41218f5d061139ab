//! Turning walked files into units, each file exactly once.

use crate::core::media::{classify, Classification, MediaUnit};
use crate::events::{EventSender, UnitEvent};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A unit and whether it came from an ambiguous same-stem group
pub(crate) struct Grouped {
    pub unit: MediaUnit,
    pub ambiguous: bool,
}

/// Remembers which files a run has already covered.
///
/// Once a same-stem group is seen as ambiguous, every member stays a simple
/// unit for the rest of the run, even after some siblings have moved away.
#[derive(Default)]
pub(crate) struct UnitGrouper {
    handled: HashSet<PathBuf>,
    /// member → the whole group
    ambiguous: HashMap<PathBuf, Vec<PathBuf>>,
}

impl UnitGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// The unit `path` belongs to, or `None` when an earlier unit covered it
    pub fn unit_for(&mut self, path: &Path, events: &EventSender) -> Option<Grouped> {
        if self.handled.contains(path) {
            return None;
        }

        let classification = match self.ambiguous.get(path) {
            Some(siblings) => Classification::Ambiguous {
                path: path.to_path_buf(),
                siblings: siblings.clone(),
            },
            None => classify(path),
        };

        let ambiguous = match &classification {
            Classification::Ambiguous { siblings, .. } => {
                for sibling in siblings {
                    self.ambiguous
                        .entry(sibling.clone())
                        .or_insert_with(|| siblings.clone());
                }
                events.unit(UnitEvent::Ambiguous {
                    path: path.to_path_buf(),
                    siblings: siblings.clone(),
                });
                true
            }
            _ => false,
        };

        let unit = MediaUnit::from_classification(classification);
        self.handled
            .extend(unit.member_paths().into_iter().map(Path::to_path_buf));
        Some(Grouped { unit, ambiguous })
    }
}
