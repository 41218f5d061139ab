//! # Configuration
//!
//! Run settings loaded from a JSON file, with command-line flags layered on
//! top by the binary.
//!
//! ```json
//! {
//!   "sources": { "phone": { "dir": "/home/me/Dropbox/Camera Uploads" } },
//!   "output": "/home/me/Pictures/library",
//!   "directory_format": "%(year)d/%(year)04d_%(month)02d_%(day)02d",
//!   "filename_format": "%(year)04d%(month)02d%(day)02d%(hour)02d%(minute)02d%(second)02d_",
//!   "mode": "0774",
//!   "backend": "sqlite"
//! }
//! ```

use crate::core::index::BackendKind;
use crate::core::placement::{PlacementConfig, DEFAULT_DIRECTORY_FORMAT, DEFAULT_FILE_MODE};
use crate::error::{Result, SorterError};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding the index inside the output root
pub const STATE_DIR: &str = ".photo-sort";

/// One named inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    /// Inboxes by name
    pub sources: BTreeMap<String, Source>,
    pub output: Option<PathBuf>,
    pub directory_format: String,
    /// Prefix prepended to every filed name
    pub filename_format: Option<String>,
    #[serde(serialize_with = "serialize_mode", deserialize_with = "deserialize_mode")]
    pub mode: u32,
    /// Index file; defaults to a file under the output root
    pub index: Option<PathBuf>,
    /// Index backend; guessed from the index extension when unset
    pub backend: Option<BackendKind>,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            output: None,
            directory_format: DEFAULT_DIRECTORY_FORMAT.to_string(),
            filename_format: None,
            mode: DEFAULT_FILE_MODE,
            index: None,
            backend: None,
        }
    }
}

impl SorterConfig {
    /// `<config dir>/photo-sort/config.json`
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photo-sort").join("config.json"))
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SorterError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| SorterError::Config(format!("invalid config {}: {}", path.display(), e)))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Read `path`, or the default location when it exists, or use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_location() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Add an inbox under a name derived from its directory
    pub fn add_source(&mut self, dir: PathBuf) {
        let base = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        let mut name = base.clone();
        let mut n = 2;
        while self.sources.contains_key(&name) {
            name = format!("{}-{}", base, n);
            n += 1;
        }
        self.sources.insert(name, Source { dir });
    }

    pub fn source_dirs(&self) -> Vec<PathBuf> {
        self.sources.values().map(|s| s.dir.clone()).collect()
    }

    pub fn output_root(&self) -> Result<&Path> {
        self.output
            .as_deref()
            .ok_or_else(|| SorterError::Config("no output directory configured".to_string()))
    }

    pub fn backend_kind(&self) -> BackendKind {
        match (self.backend, &self.index) {
            (Some(kind), _) => kind,
            (None, Some(path)) => BackendKind::from_path(path),
            (None, None) => BackendKind::default(),
        }
    }

    /// Configured index path, or `<output>/.photo-sort/index.{db,csv}`
    pub fn index_path(&self) -> Result<PathBuf> {
        match &self.index {
            Some(path) => Ok(path.clone()),
            None => Ok(self
                .output_root()?
                .join(STATE_DIR)
                .join(self.backend_kind().default_file_name())),
        }
    }

    pub fn placement(&self) -> Result<PlacementConfig> {
        Ok(PlacementConfig::new(self.output_root()?)
            .with_directory_format(self.directory_format.clone())
            .with_filename_format(self.filename_format.clone())
            .with_file_mode(self.mode))
    }
}

/// Parse an octal permission string such as `0774`, `774` or `0o774`
pub fn parse_mode(text: &str) -> std::result::Result<u32, String> {
    let digits = text.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("'{}' is not an octal mode", text))?;
    if mode > 0o7777 {
        return Err(format!("mode {} is out of range", text));
    }
    Ok(mode)
}

fn serialize_mode<S: Serializer>(mode: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:04o}", mode))
}

fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Text(String),
        Number(u32),
    }

    match Mode::deserialize(deserializer)? {
        Mode::Text(text) => parse_mode(&text).map_err(de::Error::custom),
        Mode::Number(mode) if mode <= 0o7777 => Ok(mode),
        Mode::Number(mode) => Err(de::Error::custom(format!("mode {} is out of range", mode))),
    }
}
