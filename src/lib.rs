//! # Photo Inbox Sorter
//!
//! Files photos, raws, movies and audio from inbox directories into a
//! dated library, never filing the same content twice.
//!
//! ## How a file is filed
//! - Grouped with a same-stem sidecar when it has one (`mov1.mp4` + `mov1.jpg`)
//! - Fingerprinted by content digest plus embedded capture time
//! - Skipped when the index already knows the fingerprint
//! - Otherwise moved to e.g. `2013/2013_08_24/` and recorded in the index
//!
//! ## Architecture
//! - `core` - The filing engine
//! - `events` - Progress reporting to the UI
//! - `error` - Error types
//! - `config` - Run settings

pub mod config;
pub mod core;
pub mod error;
pub mod events;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, SorterError};

/// Initialize tracing for the binary.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
