//! Index backend trait definition.

use super::IndexEntry;
use crate::error::IndexError;
use std::path::Path;

/// Trait for durable index stores
///
/// Implementations only persist; the fingerprint → entry map lives in
/// [`DuplicateIndex`](super::DuplicateIndex).
pub trait IndexBackend: Send {
    /// Read every persisted entry
    ///
    /// A store that does not exist yet yields no entries, not an error.
    fn load(&mut self) -> Result<Vec<IndexEntry>, IndexError>;

    /// Persist one new entry
    ///
    /// Stores that can enforce fingerprint uniqueness themselves report a
    /// re-insertion as [`IndexError::DuplicateKey`].
    fn insert(&mut self, entry: &IndexEntry) -> Result<(), IndexError>;

    /// Make every entry inserted since the last flush durable
    ///
    /// `entries` is the complete current set, for stores that rewrite in full.
    fn flush(&mut self, entries: &[&IndexEntry]) -> Result<(), IndexError>;

    /// Release the store at the end of a run
    fn close(self: Box<Self>) -> Result<(), IndexError> {
        Ok(())
    }

    /// Where the store lives, for messages
    fn location(&self) -> &Path;
}
