//! In-memory index backend for testing.

use super::{IndexBackend, IndexEntry};
use crate::error::IndexError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// In-memory index backend
///
/// Clones share the same storage, so a test can reopen "the same" index
/// after closing one handle.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    entries: Arc<RwLock<Vec<IndexEntry>>>,
}

impl MemoryIndex {
    /// Create a new, empty in-memory index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn stored(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn poisoned() -> IndexError {
        IndexError::Corrupt {
            path: PathBuf::from("memory"),
            reason: "lock poisoned".to_string(),
        }
    }
}

impl IndexBackend for MemoryIndex {
    fn load(&mut self) -> Result<Vec<IndexEntry>, IndexError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.clone())
    }

    fn insert(&mut self, entry: &IndexEntry) -> Result<(), IndexError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        if let Some(existing) = entries.iter().find(|e| e.fingerprint == entry.fingerprint) {
            return Err(IndexError::DuplicateKey {
                fingerprint: entry.fingerprint.clone(),
                existing: Path::new(&existing.directory).join(&existing.filename),
            });
        }
        entries.push(entry.clone());
        Ok(())
    }

    fn flush(&mut self, _entries: &[&IndexEntry]) -> Result<(), IndexError> {
        Ok(())
    }

    fn location(&self) -> &Path {
        Path::new("memory")
    }
}
