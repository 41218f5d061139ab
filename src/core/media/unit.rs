//! The logical unit of media: one file, or media plus sidecar.

use super::{classify, Classification, CompositeKind, FileType, UnitKind};
use crate::core::fingerprint::{content_digest, files_identical, Fingerprint};
use crate::core::metadata::{filesystem_time, MetadataSource};
use crate::error::HashError;
use chrono::NaiveDateTime;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The files making up a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Members {
    Simple {
        path: PathBuf,
        file_type: FileType,
    },
    Composite {
        kind: CompositeKind,
        media: PathBuf,
        sidecar: PathBuf,
    },
}

/// Which member of a unit a relocation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    /// The single file, or the media file of a composite
    Primary,
    /// The metadata photo of a composite
    Sidecar,
}

/// One logical piece of media to file
#[derive(Debug, Clone)]
pub struct MediaUnit {
    members: Members,
    /// Computed on first request; content does not change when the unit moves
    fingerprint: Option<Fingerprint>,
}

impl MediaUnit {
    /// Classify `path` and build the matching unit
    pub fn build_for(path: &Path) -> Self {
        Self::from_classification(classify(path))
    }

    /// Build a unit from a classification result
    pub fn from_classification(classification: Classification) -> Self {
        match classification {
            Classification::Pair {
                kind,
                media,
                sidecar,
            } => {
                info!("{} unit: {}", kind.as_str(), media.with_extension("").display());
                Self::from_members(Members::Composite {
                    kind,
                    media,
                    sidecar,
                })
            }
            Classification::Single { path } | Classification::Ambiguous { path, .. } => {
                Self::simple(path)
            }
        }
    }

    /// A unit made of exactly one file
    pub fn simple(path: PathBuf) -> Self {
        let file_type = FileType::from_path(&path);
        debug!("{} is of type {}", path.display(), file_type.as_str());
        Self::from_members(Members::Simple { path, file_type })
    }

    fn from_members(members: Members) -> Self {
        Self {
            members,
            fingerprint: None,
        }
    }

    /// The member files
    pub fn members(&self) -> &Members {
        &self.members
    }

    /// Declared kind
    pub fn kind(&self) -> UnitKind {
        match &self.members {
            Members::Simple { file_type, .. } => UnitKind::Simple(*file_type),
            Members::Composite { kind, .. } => UnitKind::Composite(*kind),
        }
    }

    /// The single file, or the media file of a composite
    pub fn primary_path(&self) -> &Path {
        match &self.members {
            Members::Simple { path, .. } => path,
            Members::Composite { media, .. } => media,
        }
    }

    /// The metadata photo, for composites
    pub fn sidecar_path(&self) -> Option<&Path> {
        match &self.members {
            Members::Simple { .. } => None,
            Members::Composite { sidecar, .. } => Some(sidecar),
        }
    }

    /// Every file of the unit, primary first
    pub fn member_paths(&self) -> Vec<&Path> {
        match &self.members {
            Members::Simple { path, .. } => vec![path.as_path()],
            Members::Composite { media, sidecar, .. } => vec![media.as_path(), sidecar.as_path()],
        }
    }

    /// File name of the primary file
    pub fn filename(&self) -> String {
        self.primary_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the primary file
    pub fn directory(&self) -> &Path {
        self.primary_path().parent().unwrap_or(Path::new(""))
    }

    /// The fingerprint, if it was already computed
    pub fn cached_fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// Compute the fingerprint once, then serve it from the cache.
    ///
    /// Simple units hash their file and, when the type carries metadata,
    /// append the embedded capture time. Composites hash the media file and
    /// append the sidecar's embedded capture time.
    pub fn fingerprint(&mut self, source: &dyn MetadataSource) -> Result<&Fingerprint, HashError> {
        let fingerprint = match self.fingerprint.take() {
            Some(cached) => cached,
            None => {
                let computed = self.compute_fingerprint(source)?;
                debug!("fingerprint of {}: {}", self.primary_path().display(), computed);
                computed
            }
        };
        Ok(self.fingerprint.insert(fingerprint))
    }

    fn compute_fingerprint(&self, source: &dyn MetadataSource) -> Result<Fingerprint, HashError> {
        match &self.members {
            Members::Simple { path, file_type } => {
                let digest = content_digest(path)?;
                let captured = if file_type.carries_metadata() {
                    source.embedded_time(path)
                } else {
                    None
                };
                Ok(Fingerprint::new(digest, captured))
            }
            Members::Composite { media, sidecar, .. } => {
                let digest = content_digest(media)?;
                Ok(Fingerprint::new(digest, source.embedded_time(sidecar)))
            }
        }
    }

    /// When the unit was captured.
    ///
    /// Composites delegate entirely to their sidecar. Files that may carry
    /// metadata try embedded tags first; everything falls back to the
    /// filesystem timestamps.
    pub fn capture_time(&self, source: &dyn MetadataSource) -> io::Result<NaiveDateTime> {
        let (path, carries_metadata) = match &self.members {
            Members::Simple { path, file_type } => (path.as_path(), file_type.carries_metadata()),
            Members::Composite { sidecar, .. } => (sidecar.as_path(), true),
        };

        if carries_metadata {
            if let Some(captured) = source.embedded_time(path) {
                return Ok(captured);
            }
        }
        filesystem_time(path)
    }

    /// Byte-compare this unit with another one on disk.
    ///
    /// Composites only match composites of the same kind whose media and
    /// sidecar both match. Unreadable files never match.
    pub fn same_content_as(&self, other: &MediaUnit) -> bool {
        let identical = |a: &Path, b: &Path| match files_identical(a, b) {
            Ok(same) => same,
            Err(e) => {
                info!(
                    "comparing {} to {} failed, erased or moved? {}",
                    a.display(),
                    b.display(),
                    e
                );
                false
            }
        };

        match (&self.members, &other.members) {
            (Members::Simple { path: a, .. }, Members::Simple { path: b, .. }) => identical(a, b),
            (
                Members::Composite {
                    kind: kind_a,
                    media: media_a,
                    sidecar: sidecar_a,
                },
                Members::Composite {
                    kind: kind_b,
                    media: media_b,
                    sidecar: sidecar_b,
                },
            ) => kind_a == kind_b && identical(media_a, media_b) && identical(sidecar_a, sidecar_b),
            _ => false,
        }
    }

    /// Record that a member now lives at `to`. The fingerprint is kept.
    pub(crate) fn relocate(&mut self, member: Member, to: PathBuf) {
        match (&mut self.members, member) {
            (Members::Simple { path, .. }, Member::Primary) => *path = to,
            (Members::Composite { media, .. }, Member::Primary) => *media = to,
            (Members::Composite { sidecar, .. }, Member::Sidecar) => *sidecar = to,
            (Members::Simple { .. }, Member::Sidecar) => {
                debug!("ignoring sidecar relocation of a simple unit")
            }
        }
    }
}
