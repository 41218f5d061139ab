//! # Media Module
//!
//! Decides what one logical unit of media is.
//!
//! A unit is either a single file, or a primary media file travelling with
//! a metadata-bearing photo of the same stem (a "sidecar"):
//!
//! | Composite kind          | Primary | Sidecar |
//! |-------------------------|---------|---------|
//! | `movie_with_metadata`   | movie   | photo   |
//! | `raw_with_metadata`     | raw     | photo   |
//! | `audio_with_metadata`   | audio   | photo   |
//!
//! ## Example
//! ```rust,ignore
//! use photo_inbox_sorter::core::media::MediaUnit;
//! use photo_inbox_sorter::core::metadata::ExifReader;
//!
//! let mut unit = MediaUnit::build_for(Path::new("/inbox/mov1.mp4"));
//! println!("{} {}", unit.kind(), unit.fingerprint(&ExifReader)?);
//! ```

mod classifier;
mod unit;

pub use classifier::{classify, same_stem_siblings, Classification};
pub use unit::{MediaUnit, Member, Members};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Declared type of a single file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Photo,
    Raw,
    Movie,
    Audio,
    Unknown,
}

impl FileType {
    /// Detect type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "thm" | "gif" => FileType::Photo,
            "cr2" | "raw" | "arw" | "orf" | "rw2" | "tif" => FileType::Raw,
            "mpeg" | "mpg" | "mov" | "mp4" | "avi" | "mts" => FileType::Movie,
            "wav" => FileType::Audio,
            _ => FileType::Unknown,
        }
    }

    /// Detect type of a path; paths without an extension are unknown
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(FileType::from_extension)
            .unwrap_or(FileType::Unknown)
    }

    /// Whether files of this type may carry embedded capture metadata
    pub fn carries_metadata(&self) -> bool {
        matches!(self, FileType::Photo | FileType::Raw)
    }

    /// Name stored in the index
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Photo => "photo",
            FileType::Raw => "raw",
            FileType::Movie => "movie",
            FileType::Audio => "audio",
            FileType::Unknown => "unknown",
        }
    }
}

/// A known pairing of primary media and metadata sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeKind {
    MovieWithMetadata,
    RawWithMetadata,
    AudioWithMetadata,
}

/// Every composite rule: (kind, primary type, sidecar type)
const COMPOSITE_RULES: [(CompositeKind, FileType, FileType); 3] = [
    (CompositeKind::MovieWithMetadata, FileType::Movie, FileType::Photo),
    (CompositeKind::RawWithMetadata, FileType::Raw, FileType::Photo),
    (CompositeKind::AudioWithMetadata, FileType::Audio, FileType::Photo),
];

impl CompositeKind {
    /// Match an unordered pair of types against the known rules.
    ///
    /// Returns the kind and whether `a` is the primary media file.
    pub fn for_pair(a: FileType, b: FileType) -> Option<(CompositeKind, bool)> {
        COMPOSITE_RULES.iter().find_map(|&(kind, primary, sidecar)| {
            if (a, b) == (primary, sidecar) {
                Some((kind, true))
            } else if (b, a) == (primary, sidecar) {
                Some((kind, false))
            } else {
                None
            }
        })
    }

    /// Type of the primary media file
    pub fn primary_type(&self) -> FileType {
        match self {
            CompositeKind::MovieWithMetadata => FileType::Movie,
            CompositeKind::RawWithMetadata => FileType::Raw,
            CompositeKind::AudioWithMetadata => FileType::Audio,
        }
    }

    /// Name stored in the index
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeKind::MovieWithMetadata => "movie_with_metadata",
            CompositeKind::RawWithMetadata => "raw_with_metadata",
            CompositeKind::AudioWithMetadata => "audio_with_metadata",
        }
    }
}

/// Declared kind of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Simple(FileType),
    Composite(CompositeKind),
}

impl UnitKind {
    /// Name stored in the index
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Simple(file_type) => file_type.as_str(),
            UnitKind::Composite(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
