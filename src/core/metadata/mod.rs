//! # Metadata Module
//!
//! Resolves when a piece of media was captured.
//!
//! ## Resolution Order
//! 1. EXIF `DateTimeOriginal`
//! 2. EXIF `DateTime` (the generic image tag)
//! 3. EXIF `DateTimeDigitized`
//! 4. The earlier of the file's modification and change/creation times
//!
//! Zeroed dates (`0000:00:00 00:00:00`) and anything else that does not
//! parse as `YYYY:MM:DD HH:MM:SS` count as absent, never as an error.

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// EXIF date format: "YYYY:MM:DD HH:MM:SS"
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Raw text of the date tags found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTags {
    /// `DateTimeOriginal`
    pub original: Option<String>,
    /// `DateTime` from the primary image directory
    pub image: Option<String>,
    /// `DateTimeDigitized`
    pub digitized: Option<String>,
}

impl DateTags {
    /// Pick the first tag that is present and parseable, in priority order
    pub fn capture_time(&self) -> Option<NaiveDateTime> {
        [
            ("DateTimeOriginal", &self.original),
            ("DateTime", &self.image),
            ("DateTimeDigitized", &self.digitized),
        ]
        .into_iter()
        .find_map(|(name, raw)| {
            let parsed = raw.as_deref().and_then(parse_exif_datetime);
            if parsed.is_some() {
                debug!("capture time obtained from {}", name);
            }
            parsed
        })
    }

    /// Check if any tag was found at all
    pub fn has_data(&self) -> bool {
        self.original.is_some() || self.image.is_some() || self.digitized.is_some()
    }
}

/// Source of embedded date tags.
///
/// Implement this trait to plug in another metadata library, or a fixed
/// answer in tests.
pub trait MetadataSource: Send + Sync {
    /// Read the date tags of a file. Unreadable or tagless files yield empty tags.
    fn date_tags(&self, path: &Path) -> DateTags;

    /// Embedded capture time, if any tag is usable
    fn embedded_time(&self, path: &Path) -> Option<NaiveDateTime> {
        self.date_tags(path).capture_time()
    }
}

/// Reads EXIF tags with kamadak-exif
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl MetadataSource for ExifReader {
    fn date_tags(&self, path: &Path) -> DateTags {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("cannot open {} for EXIF: {}", path.display(), e);
                return DateTags::default();
            }
        };

        let mut bufreader = BufReader::new(&file);
        let exif_reader = match Reader::new().read_from_container(&mut bufreader) {
            Ok(r) => r,
            Err(e) => {
                debug!("no EXIF data in {}: {}", path.display(), e);
                return DateTags::default();
            }
        };

        let ascii = |tag: Tag| {
            exif_reader
                .get_field(tag, In::PRIMARY)
                .and_then(|field| get_string_value(&field.value))
        };

        DateTags {
            original: ascii(Tag::DateTimeOriginal),
            image: ascii(Tag::DateTime),
            digitized: ascii(Tag::DateTimeDigitized),
        }
    }
}

/// Parse an EXIF date, treating zeroed or malformed values as absent
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim_matches(|c: char| c == '\0' || c == '"' || c.is_whitespace());
    if s.is_empty() || s.chars().all(|c| matches!(c, '0' | ':' | ' ')) {
        return None;
    }
    NaiveDateTime::parse_from_str(s, EXIF_DATE_FORMAT).ok()
}

/// Timestamp recorded by the filesystem.
///
/// Uses the earlier of the modification and change (creation on non-Unix)
/// times, since copying between filesystems tends to bump one of them.
pub fn filesystem_time(path: &Path) -> io::Result<NaiveDateTime> {
    let metadata = fs::metadata(path)?;
    let modified = metadata.modified()?;
    let earliest = match changed_time(&metadata) {
        Some(changed) => modified.min(changed),
        None => modified,
    };

    let local: DateTime<Local> = earliest.into();
    let naive = local.naive_local();
    Ok(naive.with_nanosecond(0).unwrap_or(naive))
}

#[cfg(unix)]
fn changed_time(metadata: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    Some(UNIX_EPOCH + Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn changed_time(metadata: &fs::Metadata) -> Option<SystemTime> {
    metadata.created().ok()
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
