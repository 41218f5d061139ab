//! # Index Module
//!
//! Remembers every unit already filed, keyed by fingerprint, so that
//! overlapping inboxes never file the same content twice.
//!
//! ## Backends
//! - `CsvIndex` - flat table, rewritten in full on flush with one `.bak` generation
//! - `SqliteIndex` - normalized relational store, committed per insert
//! - `MemoryIndex` - for testing
//!
//! Directories are stored relative to the output root and turned back into
//! absolute paths on lookup, so a library can be moved as a whole.

mod csv_store;
mod memory;
mod migrate;
mod sqlite;
mod traits;

pub use csv_store::{CsvIndex, CSV_HEADER};
pub use memory::MemoryIndex;
pub use migrate::{migrate, MigrationReport};
pub use sqlite::SqliteIndex;
pub use traits::IndexBackend;

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// One filed unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Directory relative to the output root, `/`-separated
    pub directory: String,
    /// File name of the primary member
    pub filename: String,
    /// Declared unit kind (`photo`, `movie_with_metadata`, ...)
    pub file_type: String,
    /// Primary key
    pub fingerprint: String,
}

/// A successful lookup, with the location resolved against the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHit {
    pub entry: IndexEntry,
    /// Absolute directory
    pub directory: PathBuf,
    /// Absolute path of the filed primary member
    pub path: PathBuf,
}

/// Which durable form an index uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Csv,
    #[default]
    Sqlite,
}

impl BackendKind {
    /// Guess the backend from a file extension; anything but `.csv` is SQLite
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => BackendKind::Csv,
            _ => BackendKind::Sqlite,
        }
    }

    /// File name used when no index path is configured
    pub fn default_file_name(&self) -> &'static str {
        match self {
            BackendKind::Csv => "index.csv",
            BackendKind::Sqlite => "index.db",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(BackendKind::Csv),
            "sqlite" | "db" => Ok(BackendKind::Sqlite),
            other => Err(format!("unknown index backend '{}', expected csv or sqlite", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Csv => f.write_str("csv"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Open the durable store of the given kind
pub fn open_backend(kind: BackendKind, path: &Path) -> Result<Box<dyn IndexBackend>, IndexError> {
    Ok(match kind {
        BackendKind::Csv => Box::new(CsvIndex::new(path)),
        BackendKind::Sqlite => Box::new(SqliteIndex::open(path)?),
    })
}

/// Open a store for a run that must leave it untouched.
///
/// A missing store is not created; the run starts from an empty in-memory
/// index instead.
pub fn open_backend_read_only(
    kind: BackendKind,
    path: &Path,
) -> Result<Box<dyn IndexBackend>, IndexError> {
    if !path.exists() {
        debug!("{} does not exist yet, starting from an empty index", path.display());
        return Ok(Box::new(MemoryIndex::new()));
    }
    Ok(match kind {
        BackendKind::Csv => Box::new(CsvIndex::new(path)),
        BackendKind::Sqlite => Box::new(SqliteIndex::open_read_only(path)?),
    })
}

/// Fingerprint → filed unit map for one run
pub struct DuplicateIndex {
    backend: Box<dyn IndexBackend>,
    output_root: PathBuf,
    entries: HashMap<String, IndexEntry>,
}

impl DuplicateIndex {
    /// Load every persisted entry from `backend`.
    ///
    /// A store with repeated fingerprints keeps the first row and warns.
    pub fn load(mut backend: Box<dyn IndexBackend>, output_root: &Path) -> Result<Self, IndexError> {
        let mut entries: HashMap<String, IndexEntry> = HashMap::new();
        for entry in backend.load()? {
            if let Some(kept) = entries.get(&entry.fingerprint) {
                warn!(
                    "index {} lists {} twice ({}/{} and {}/{}), keeping the first",
                    backend.location().display(),
                    entry.fingerprint,
                    kept.directory,
                    kept.filename,
                    entry.directory,
                    entry.filename
                );
                continue;
            }
            entries.insert(entry.fingerprint.clone(), entry);
        }

        Ok(Self {
            backend,
            output_root: output_root.to_path_buf(),
            entries,
        })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Where the durable store lives
    pub fn location(&self) -> &Path {
        self.backend.location()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Find a filed unit by fingerprint
    pub fn lookup(&self, fingerprint: &str) -> Option<IndexHit> {
        self.entries.get(fingerprint).map(|entry| self.resolve(entry))
    }

    /// Every entry, ordered by directory then filename
    pub fn entries(&self) -> Vec<&IndexEntry> {
        sorted_by_location(self.entries.values())
    }

    /// Record a newly filed unit.
    ///
    /// `directory` must lie under the output root. A fingerprint that is
    /// already present is rejected with [`IndexError::DuplicateKey`] and the
    /// existing entry is left as it was.
    pub fn record(
        &mut self,
        directory: &Path,
        filename: &str,
        file_type: &str,
        fingerprint: &str,
    ) -> Result<&IndexEntry, IndexError> {
        if let Some(existing) = self.entries.get(fingerprint) {
            return Err(IndexError::DuplicateKey {
                fingerprint: fingerprint.to_string(),
                existing: self.resolve(existing).path,
            });
        }

        let entry = IndexEntry {
            directory: self.relative_directory(directory)?,
            filename: filename.to_string(),
            file_type: file_type.to_string(),
            fingerprint: fingerprint.to_string(),
        };
        self.backend.insert(&entry)?;
        debug!("recorded {} at {}/{}", entry.fingerprint, entry.directory, entry.filename);

        Ok(self.entries.entry(fingerprint.to_string()).or_insert(entry))
    }

    /// Persist everything recorded since the last flush
    pub fn flush(&mut self) -> Result<(), IndexError> {
        let entries = sorted_by_location(self.entries.values());
        self.backend.flush(&entries)
    }

    /// Flush and release the durable store
    pub fn close(mut self) -> Result<(), IndexError> {
        self.flush()?;
        info!(
            "index {} closed with {} entries",
            self.backend.location().display(),
            self.entries.len()
        );
        self.backend.close()
    }

    fn resolve(&self, entry: &IndexEntry) -> IndexHit {
        let directory = entry
            .directory
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.output_root.clone(), |dir, part| dir.join(part));
        let path = directory.join(&entry.filename);
        IndexHit {
            entry: entry.clone(),
            directory,
            path,
        }
    }

    fn relative_directory(&self, directory: &Path) -> Result<String, IndexError> {
        let outside = || IndexError::OutsideOutputRoot {
            path: directory.to_path_buf(),
            root: self.output_root.clone(),
        };

        // Walked paths are canonical while the configured root may not be.
        let relative = match directory.strip_prefix(&self.output_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                let root = fs::canonicalize(&self.output_root).map_err(|_| outside())?;
                directory.strip_prefix(&root).map_err(|_| outside())?.to_path_buf()
            }
        };
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(outside()),
            }
        }
        Ok(parts.join("/"))
    }
}

/// Order entries by directory, then filename
pub(crate) fn sorted_by_location<'a>(
    entries: impl IntoIterator<Item = &'a IndexEntry>,
) -> Vec<&'a IndexEntry> {
    let mut entries: Vec<&IndexEntry> = entries.into_iter().collect();
    entries.sort_by(|a, b| {
        (a.directory.as_str(), a.filename.as_str()).cmp(&(b.directory.as_str(), b.filename.as_str()))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/library")
    }

    fn open(backend: &MemoryIndex) -> DuplicateIndex {
        DuplicateIndex::load(Box::new(backend.clone()), &root()).unwrap()
    }

    #[test]
    fn empty_backend_loads_empty() {
        let index = open(&MemoryIndex::new());
        assert!(index.is_empty());
        assert!(!index.contains("abc"));
        assert!(index.lookup("abc").is_none());
    }

    #[test]
    fn record_stores_relative_directory() {
        let backend = MemoryIndex::new();
        let mut index = open(&backend);

        let entry = index
            .record(&root().join("2013/2013_08_24"), "img.jpg", "photo", "abc")
            .unwrap();
        assert_eq!(entry.directory, "2013/2013_08_24");

        let hit = index.lookup("abc").unwrap();
        assert_eq!(hit.directory, root().join("2013").join("2013_08_24"));
        assert_eq!(hit.path, root().join("2013").join("2013_08_24").join("img.jpg"));
        assert_eq!(backend.stored(), 1);
    }

    #[test]
    fn record_directly_under_root() {
        let mut index = open(&MemoryIndex::new());

        index.record(&root(), "img.jpg", "photo", "abc").unwrap();
        assert_eq!(index.lookup("abc").unwrap().path, root().join("img.jpg"));
    }

    #[test]
    fn second_record_is_rejected() {
        let backend = MemoryIndex::new();
        let mut index = open(&backend);
        index.record(&root().join("2013"), "a.jpg", "photo", "abc").unwrap();

        let result = index.record(&root().join("2014"), "b.jpg", "photo", "abc");
        match result {
            Err(IndexError::DuplicateKey { fingerprint, existing }) => {
                assert_eq!(fingerprint, "abc");
                assert_eq!(existing, root().join("2013").join("a.jpg"));
            }
            other => panic!("expected a duplicate key, got {:?}", other),
        }
        assert_eq!(index.lookup("abc").unwrap().entry.filename, "a.jpg");
        assert_eq!(backend.stored(), 1);
    }

    #[test]
    fn directories_outside_root_are_rejected() {
        let mut index = open(&MemoryIndex::new());

        let result = index.record(Path::new("/elsewhere/2013"), "a.jpg", "photo", "abc");
        assert!(matches!(result, Err(IndexError::OutsideOutputRoot { .. })));

        let result = index.record(&root().join("../escape"), "a.jpg", "photo", "abc");
        assert!(matches!(result, Err(IndexError::OutsideOutputRoot { .. })));
        assert!(index.is_empty());
    }

    #[test]
    fn reload_sees_recorded_entries() {
        let backend = MemoryIndex::new();
        {
            let mut index = open(&backend);
            index.record(&root().join("2013"), "a.jpg", "photo", "abc").unwrap();
            index.close().unwrap();
        }

        let index = open(&backend);
        assert!(index.contains("abc"));
    }

    #[test]
    fn repeated_rows_keep_the_first() {
        let backend = MemoryIndex::new();
        let mut raw = backend.clone();
        raw.insert(&IndexEntry {
            directory: "2013".to_string(),
            filename: "first.jpg".to_string(),
            file_type: "photo".to_string(),
            fingerprint: "abc".to_string(),
        })
        .unwrap();

        struct Repeating(MemoryIndex);
        impl IndexBackend for Repeating {
            fn load(&mut self) -> Result<Vec<IndexEntry>, IndexError> {
                let mut entries = self.0.load()?;
                let mut copy = entries[0].clone();
                copy.filename = "second.jpg".to_string();
                entries.push(copy);
                Ok(entries)
            }
            fn insert(&mut self, entry: &IndexEntry) -> Result<(), IndexError> {
                self.0.insert(entry)
            }
            fn flush(&mut self, entries: &[&IndexEntry]) -> Result<(), IndexError> {
                self.0.flush(entries)
            }
            fn location(&self) -> &Path {
                self.0.location()
            }
        }

        let index = DuplicateIndex::load(Box::new(Repeating(backend)), &root()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("abc").unwrap().entry.filename, "first.jpg");
    }

    #[test]
    fn entries_are_ordered() {
        let mut index = open(&MemoryIndex::new());
        index.record(&root().join("2014"), "a.jpg", "photo", "1").unwrap();
        index.record(&root().join("2013"), "b.jpg", "photo", "2").unwrap();
        index.record(&root().join("2013"), "a.jpg", "photo", "3").unwrap();

        let names: Vec<(&str, &str)> = index
            .entries()
            .iter()
            .map(|e| (e.directory.as_str(), e.filename.as_str()))
            .collect();
        assert_eq!(names, vec![("2013", "a.jpg"), ("2013", "b.jpg"), ("2014", "a.jpg")]);
    }

    #[test]
    fn read_only_open_of_a_missing_store_creates_nothing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(".photo-sort").join("index.db");

        let mut backend = open_backend_read_only(BackendKind::Sqlite, &path).unwrap();
        assert!(backend.load().unwrap().is_empty());
        backend.flush(&[]).unwrap();

        assert!(!path.exists());
        assert!(!temp_dir.path().join(".photo-sort").exists());
    }

    #[test]
    fn read_only_open_loads_an_existing_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("index.db");
        {
            let mut index = DuplicateIndex::load(open_backend(BackendKind::Sqlite, &path).unwrap(), &root()).unwrap();
            index.record(&root().join("2013"), "a.jpg", "photo", "abc").unwrap();
            index.close().unwrap();
        }

        let index = DuplicateIndex::load(open_backend_read_only(BackendKind::Sqlite, &path).unwrap(), &root()).unwrap();
        assert!(index.contains("abc"));
    }

    #[test]
    fn backend_kind_parsing() {
        assert_eq!("csv".parse::<BackendKind>().unwrap(), BackendKind::Csv);
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("xml".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::from_path(Path::new("/x/index.CSV")), BackendKind::Csv);
        assert_eq!(BackendKind::from_path(Path::new("/x/index.db")), BackendKind::Sqlite);
    }
}
