//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, MediaFile, MediaScanner, ScanResult};
use crate::error::ScanError;
use crate::events::{EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Subtrees never entered, e.g. the output directory inside an inbox
    pub exclude: Vec<PathBuf>,
    /// Whether files of unknown type are returned
    pub include_unknown: bool,
}

impl ScanConfig {
    /// Never descend into `path`
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: MediaFilter,
    exclude: Vec<PathBuf>,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = MediaFilter::new()
            .with_hidden(config.include_hidden)
            .with_unknown(config.include_unknown);
        let exclude = config.exclude.iter().map(|p| normalize(p)).collect();

        Self {
            config,
            filter,
            exclude,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|ex| path.starts_with(ex))
    }

    fn enter(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        if !self.config.include_hidden && MediaFilter::is_hidden(entry.path()) {
            return false;
        }
        if self.is_excluded(entry.path()) {
            debug!("not entering excluded {}", entry.path().display());
            return false;
        }
        true
    }

    /// Scan a single directory
    fn scan_directory(
        &self,
        root: &Path,
        events: Option<&EventSender>,
    ) -> Result<(Vec<MediaFile>, Vec<ScanError>), ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        let root = normalize(root);
        if self.is_excluded(&root) {
            debug!("{} is excluded, skipping", root.display());
            return Ok((Vec::new(), Vec::new()));
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        let mut directories_scanned = 0;

        let mut walker = WalkDir::new(&root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        for entry_result in walker.into_iter().filter_entry(|e| self.enter(e)) {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    let error = match e.io_error().map(io::Error::kind) {
                        Some(io::ErrorKind::PermissionDenied) => {
                            ScanError::PermissionDenied { path: path.clone() }
                        }
                        _ => ScanError::ReadDirectory {
                            path: path.clone(),
                            source: e.into_io_error().unwrap_or_else(|| io::Error::other("walk failed")),
                        },
                    };
                    warn!("{}", error);
                    if let Some(sender) = events {
                        sender.scan(ScanEvent::Error {
                            path,
                            message: error.to_string(),
                        });
                    }
                    errors.push(error);
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_dir() {
                directories_scanned += 1;
                if let Some(sender) = events {
                    sender.scan(ScanEvent::Progress(ScanProgress {
                        directories_scanned,
                        files_found: files.len(),
                        current_path: path.to_path_buf(),
                    }));
                }
                continue;
            }

            if !self.filter.should_include(path) {
                continue;
            }

            match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => files.push(MediaFile {
                    path: path.to_path_buf(),
                    size: metadata.len(),
                    file_type: self.filter.file_type(path),
                }),
                Ok(_) => {}
                Err(source) => {
                    let error = ScanError::ReadDirectory {
                        path: path.to_path_buf(),
                        source,
                    };
                    if let Some(sender) = events {
                        sender.scan(ScanEvent::Error {
                            path: path.to_path_buf(),
                            message: error.to_string(),
                        });
                    }
                    errors.push(error);
                }
            }
        }

        Ok((files, errors))
    }

    fn scan_all(&self, paths: &[PathBuf], events: Option<&EventSender>) -> Result<ScanResult, ScanError> {
        if let Some(sender) = events {
            sender.scan(ScanEvent::Started {
                paths: paths.to_vec(),
            });
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        for path in paths {
            let (found, errs) = self.scan_directory(path, events)?;
            files.extend(found);
            errors.extend(errs);
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        if let Some(sender) = events {
            sender.scan(ScanEvent::Completed {
                total_files: files.len(),
            });
        }
        Ok(ScanResult { files, errors })
    }
}

impl MediaScanner for WalkDirScanner {
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError> {
        self.scan_all(paths, None)
    }

    fn scan_with_events(&self, paths: &[PathBuf], events: &EventSender) -> Result<ScanResult, ScanError> {
        self.scan_all(paths, Some(events))
    }
}

/// Absolute, symlink-resolved form of a path when it exists
fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
