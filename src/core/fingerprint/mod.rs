//! # Fingerprint Module
//!
//! Computes the dedup key of a unit.
//!
//! A fingerprint is the hex MD5 digest of the primary file, optionally
//! followed by `" - "` and the capture time read from embedded metadata:
//!
//! ```text
//! d41d8cd98f00b204e9800998ecf8427e - 2013-08-24 13:05:52
//! ```
//!
//! The timestamp keeps two byte-identical media files with different
//! metadata sidecars from being treated as the same shot.

mod compare;

pub use compare::files_identical;

use crate::error::HashError;
use chrono::NaiveDateTime;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read size for streaming files through the hasher
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Separator between digest and capture time
pub const TIME_SEPARATOR: &str = " - ";

/// Canonical capture-time format inside a fingerprint
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The dedup key of a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Combine a content digest with an optional capture time
    pub fn new(digest: String, captured: Option<NaiveDateTime>) -> Self {
        match captured {
            Some(time) => Self(format!(
                "{}{}{}",
                digest,
                TIME_SEPARATOR,
                time.format(TIME_FORMAT)
            )),
            None => Self(digest),
        }
    }

    /// The fingerprint as stored in the index
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The content digest part, without any capture time
    pub fn digest(&self) -> &str {
        self.0
            .split_once(TIME_SEPARATOR)
            .map_or(self.0.as_str(), |(digest, _)| digest)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stream a file through MD5 and return the lowercase hex digest
pub fn content_digest(path: &Path) -> Result<String, HashError> {
    let io_error = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_error)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
