//! Sidecar detection from same-stem siblings.

use super::{CompositeKind, FileType};
use crate::error::ClassifyError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a file groups with its siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The file stands on its own
    Single { path: PathBuf },
    /// The file is half of a known primary + sidecar pair
    Pair {
        kind: CompositeKind,
        media: PathBuf,
        sidecar: PathBuf,
    },
    /// More than two files share the stem; each is treated on its own
    Ambiguous { path: PathBuf, siblings: Vec<PathBuf> },
}

impl Classification {
    /// The ambiguity as an error value, for reporting
    pub fn ambiguity(&self) -> Option<ClassifyError> {
        match self {
            Classification::Ambiguous { path, siblings } => Some(ClassifyError::Ambiguous {
                stem: path.with_extension(""),
                siblings: siblings.clone(),
            }),
            _ => None,
        }
    }
}

/// List every file named `<stem>.<anything>` next to `path`, sorted.
///
/// Paths without an extension have no siblings.
pub fn same_stem_siblings(path: &Path) -> io::Result<Vec<PathBuf>> {
    let (Some(stem), Some(_)) = (path.file_stem().and_then(|s| s.to_str()), path.extension())
    else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}.", stem);
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut siblings = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && entry.file_type()?.is_file() {
            siblings.push(parent.join(name));
        }
    }
    siblings.sort();
    Ok(siblings)
}

/// Classify a file by inspecting its same-stem siblings at call time.
///
/// Never cached: the answer depends on what is on disk right now.
pub fn classify(path: &Path) -> Classification {
    let single = || Classification::Single {
        path: path.to_path_buf(),
    };

    let siblings = match same_stem_siblings(path) {
        Ok(siblings) => siblings,
        Err(e) => {
            warn!("cannot list siblings of {}: {}", path.display(), e);
            return single();
        }
    };

    match siblings.len() {
        0 | 1 => single(),
        2 => {
            let (a, b) = (&siblings[0], &siblings[1]);
            match CompositeKind::for_pair(FileType::from_path(a), FileType::from_path(b)) {
                Some((kind, a_is_media)) => {
                    let (media, sidecar) = if a_is_media { (a, b) } else { (b, a) };
                    debug!("{}: {} + {}", kind.as_str(), media.display(), sidecar.display());
                    Classification::Pair {
                        kind,
                        media: media.clone(),
                        sidecar: sidecar.clone(),
                    }
                }
                None => {
                    debug!("files aren't a known pair: {:?}", siblings);
                    single()
                }
            }
        }
        _ => {
            let classification = Classification::Ambiguous {
                path: path.to_path_buf(),
                siblings,
            };
            if let Some(ambiguity) = classification.ambiguity() {
                warn!("{}", ambiguity);
            }
            classification
        }
    }
}
