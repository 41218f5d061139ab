//! Flat CSV index backend.
//!
//! Layout: header `directory,filename,type,hash`, then one row per entry.
//! Every flush rewrites the whole file through a temporary file in the same
//! directory and keeps the previous version as `<name>.bak`.

use super::{IndexBackend, IndexEntry};
use crate::error::IndexError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Header row of the flat index
pub const CSV_HEADER: [&str; 4] = ["directory", "filename", "type", "hash"];

/// CSV-backed index
pub struct CsvIndex {
    path: PathBuf,
    dirty: bool,
}

impl CsvIndex {
    /// Use the table at `path`; nothing is read until [`IndexBackend::load`]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            dirty: false,
        }
    }

    /// Path of the one-generation backup
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn corrupt(&self, reason: impl ToString) -> IndexError {
        IndexError::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn io(&self, source: io::Error) -> IndexError {
        IndexError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write_table(&self, file: &mut fs::File, entries: &[&IndexEntry]) -> io::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut *file);
        writer.write_record(CSV_HEADER).map_err(io::Error::other)?;
        for entry in entries {
            writer
                .write_record([
                    entry.directory.as_str(),
                    entry.filename.as_str(),
                    entry.file_type.as_str(),
                    entry.fingerprint.as_str(),
                ])
                .map_err(io::Error::other)?;
        }
        writer.flush()?;
        drop(writer);
        file.flush()?;
        file.sync_all()
    }
}

impl IndexBackend for CsvIndex {
    fn load(&mut self) -> Result<Vec<IndexEntry>, IndexError> {
        if !self.path.exists() {
            info!("index {} does not exist yet, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        info!("loading index {}", self.path.display());
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| self.corrupt(e))?;

        let mut entries = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| self.corrupt(e))?;
            if record.len() != CSV_HEADER.len() {
                return Err(self.corrupt(format!(
                    "row {} has {} fields, expected {}",
                    row + 2,
                    record.len(),
                    CSV_HEADER.len()
                )));
            }
            entries.push(IndexEntry {
                directory: record[0].to_string(),
                filename: record[1].to_string(),
                file_type: record[2].to_string(),
                fingerprint: record[3].to_string(),
            });
        }

        info!("index load finished, {} entries", entries.len());
        Ok(entries)
    }

    fn insert(&mut self, _entry: &IndexEntry) -> Result<(), IndexError> {
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self, entries: &[&IndexEntry]) -> Result<(), IndexError> {
        if !self.dirty {
            return Ok(());
        }

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.io(e))?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| self.io(e))?;
        self.write_table(temp.as_file_mut(), entries)
            .map_err(|e| self.io(e))?;

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path()).map_err(|e| self.io(e))?;
        }
        temp.persist(&self.path).map_err(|e| self.io(e.error))?;

        self.dirty = false;
        info!("index written: {} ({} entries)", self.path.display(), entries.len());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
