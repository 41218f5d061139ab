//! # Pipeline Module
//!
//! The sequential runs over media files.
//!
//! ## Runs
//! 1. **Sort** - scan inboxes, classify, fingerprint, skip duplicates,
//!    place the rest in the dated library and record them
//! 2. **Rebuild** - walk the library and regenerate the index from it
//!
//! Everything happens on the calling thread, one unit at a time. Per-unit
//! failures are reported and the run moves on; index failures end it.

mod grouping;
mod rebuild;
mod sorter;

pub use rebuild::{IndexRebuilder, RebuildResult, RebuildSummary};
pub use sorter::{RunConfig, SortResult, Sorter, SorterBuilder};
