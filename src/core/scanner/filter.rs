//! File filtering logic for the scanner.

use crate::core::media::FileType;
use std::path::Path;

/// Decides which files are candidates for sorting
pub struct MediaFilter {
    /// Whether to include hidden files
    include_hidden: bool,
    /// Whether files of unknown type are filed too
    include_unknown: bool,
}

impl MediaFilter {
    /// Known media types only, hidden files skipped
    pub fn new() -> Self {
        Self {
            include_hidden: false,
            include_unknown: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Include files whose extension is not a known media type
    pub fn with_unknown(mut self, include: bool) -> Self {
        self.include_unknown = include;
        self
    }

    /// Whether a file name is hidden
    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with('.'))
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(path) {
            return false;
        }
        self.include_unknown || self.file_type(path) != FileType::Unknown
    }

    /// Get the declared type of a path
    pub fn file_type(&self, path: &Path) -> FileType {
        FileType::from_path(path)
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_includes_every_media_family() {
        let filter = MediaFilter::new();
        assert!(filter.should_include(Path::new("/inbox/image.JPG")));
        assert!(filter.should_include(Path::new("/inbox/raw.cr2")));
        assert!(filter.should_include(Path::new("/inbox/clip.mts")));
        assert!(filter.should_include(Path::new("/inbox/memo.wav")));
    }

    #[test]
    fn filter_excludes_unknown_by_default() {
        let filter = MediaFilter::new();
        assert!(!filter.should_include(Path::new("/inbox/notes.txt")));
        assert!(!filter.should_include(Path::new("/inbox/no_extension")));
        assert!(MediaFilter::new()
            .with_unknown(true)
            .should_include(Path::new("/inbox/notes.txt")));
    }

    #[test]
    fn filter_excludes_hidden_by_default() {
        let filter = MediaFilter::new();
        assert!(!filter.should_include(Path::new("/inbox/.hidden.jpg")));
        assert!(MediaFilter::new()
            .with_hidden(true)
            .should_include(Path::new("/inbox/.hidden.jpg")));
    }
}
