//! # Core Module
//!
//! The UI-agnostic filing engine.
//!
//! ## Modules
//! - `scanner` - Discovers media files in inbox directories
//! - `media` - File types, sidecar pairing and media units
//! - `metadata` - Embedded and filesystem capture times
//! - `fingerprint` - Content digests and the duplicate key
//! - `index` - Durable record of everything already filed
//! - `placement` - Dated destinations and moving files there
//! - `pipeline` - The sort and rebuild runs

pub mod fingerprint;
pub mod index;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod placement;
pub mod scanner;

pub use fingerprint::Fingerprint;
pub use index::{BackendKind, DuplicateIndex, IndexEntry};
pub use media::{FileType, MediaUnit, UnitKind};
pub use pipeline::{IndexRebuilder, Sorter};
