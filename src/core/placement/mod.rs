//! # Placement Module
//!
//! Moves a unit into the dated output tree.
//!
//! ## Rules
//! - Destination directory: `output_root / directory_format(capture time)`
//! - Destination name: `filename_format(capture time) + original name`, or
//!   the original name when no filename format is set
//! - Composites keep one base name (from the media file) and each member's
//!   own extension; the sidecar moves first
//! - Existing files are never overwritten
//!
//! ## Example
//! ```rust,ignore
//! let placer = Placer::new(PlacementConfig::new("/library"))?;
//! let placement = placer.place(&mut unit, captured)?;
//! println!("filed under {}", placement.directory.display());
//! ```

mod mover;
mod pattern;

pub use mover::{create_directory_tree, directory_mode, move_file, set_file_mode};
pub use pattern::{render, render_directory, render_prefix};

use crate::core::media::{MediaUnit, Member, Members};
use crate::error::PlacementError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Directory format used when none is configured
pub const DEFAULT_DIRECTORY_FORMAT: &str = "%(year)d/%(year)04d_%(month)02d_%(day)02d";

/// Permission bits given to filed files when none are configured
pub const DEFAULT_FILE_MODE: u32 = 0o774;

/// Where and how units are filed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub output_root: PathBuf,
    pub directory_format: String,
    pub filename_format: Option<String>,
    pub file_mode: u32,
}

impl PlacementConfig {
    /// Defaults for everything but the output root
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            directory_format: DEFAULT_DIRECTORY_FORMAT.to_string(),
            filename_format: None,
            file_mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn with_directory_format(mut self, format: impl Into<String>) -> Self {
        self.directory_format = format.into();
        self
    }

    pub fn with_filename_format(mut self, format: Option<String>) -> Self {
        self.filename_format = format.filter(|f| !f.is_empty());
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }
}

/// Where a unit goes (or went)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Absolute destination directory
    pub directory: PathBuf,
    /// Destination of the single file or of the composite's media file
    pub primary: PathBuf,
    /// Destination of the composite's sidecar
    pub sidecar: Option<PathBuf>,
}

impl Placement {
    /// File name of the primary destination
    pub fn filename(&self) -> String {
        self.primary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Computes destinations and performs the moves
#[derive(Debug, Clone)]
pub struct Placer {
    config: PlacementConfig,
}

impl Placer {
    /// Create a placer, checking both formats up front
    pub fn new(config: PlacementConfig) -> Result<Self, PlacementError> {
        let probe = NaiveDateTime::default();
        render_directory(&config.directory_format, &probe)?;
        if let Some(format) = &config.filename_format {
            render_prefix(format, &probe)?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Absolute directory a unit captured at `captured` belongs in
    pub fn destination_directory(&self, captured: &NaiveDateTime) -> Result<PathBuf, PlacementError> {
        let relative = render_directory(&self.config.directory_format, captured)?;
        Ok(self.config.output_root.join(relative))
    }

    /// Destination file name for `original`
    pub fn destination_name(&self, original: &str, captured: &NaiveDateTime) -> Result<String, PlacementError> {
        match &self.config.filename_format {
            Some(format) => Ok(render_prefix(format, captured)? + original),
            None => Ok(original.to_string()),
        }
    }

    /// Work out every destination path without touching the disk
    pub fn plan(&self, unit: &MediaUnit, captured: &NaiveDateTime) -> Result<Placement, PlacementError> {
        let directory = self.destination_directory(captured)?;

        match unit.members() {
            Members::Simple { path, .. } => {
                let name = self.destination_name(&file_name(path), captured)?;
                Ok(Placement {
                    primary: directory.join(name),
                    sidecar: None,
                    directory,
                })
            }
            Members::Composite { media, sidecar, .. } => {
                let stem = media
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let base = self.destination_name(&stem, captured)?;
                Ok(Placement {
                    primary: directory.join(with_extension_of(&base, media)),
                    sidecar: Some(directory.join(with_extension_of(&base, sidecar))),
                    directory,
                })
            }
        }
    }

    /// Move `unit` into the tree and update its member paths.
    ///
    /// For composites the sidecar moves first; if it fails nothing else is
    /// touched. If the media file then fails, the sidecar stays where it
    /// landed and [`PlacementError::PartialComposite`] names both files.
    pub fn place(&self, unit: &mut MediaUnit, captured: &NaiveDateTime) -> Result<Placement, PlacementError> {
        let placement = self.plan(unit, captured)?;
        create_directory_tree(&placement.directory, self.config.file_mode)?;

        if let (Some(from), Some(to)) = (unit.sidecar_path().map(Path::to_path_buf), &placement.sidecar) {
            self.move_member(&from, to)?;
            unit.relocate(Member::Sidecar, to.clone());

            let media = unit.primary_path().to_path_buf();
            if let Err(e) = self.move_member(&media, &placement.primary) {
                error!(
                    "sidecar {} was filed but {} was not; move it by hand",
                    to.display(),
                    media.display()
                );
                return Err(PlacementError::PartialComposite {
                    sidecar: to.clone(),
                    media,
                    source: Box::new(e),
                });
            }
        } else {
            let from = unit.primary_path().to_path_buf();
            self.move_member(&from, &placement.primary)?;
        }
        unit.relocate(Member::Primary, placement.primary.clone());

        info!("{} filed as {}", unit.kind(), placement.primary.display());
        Ok(placement)
    }

    fn move_member(&self, from: &Path, to: &Path) -> Result<(), PlacementError> {
        info!("moving {} to {}", from.display(), to.display());
        move_file(from, to)?;
        set_file_mode(to, self.config.file_mode);
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn with_extension_of(base: &str, member: &Path) -> String {
    match member.extension() {
        Some(ext) => format!("{}.{}", base, ext.to_string_lossy()),
        None => base.to_string(),
    }
}
