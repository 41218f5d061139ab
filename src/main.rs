//! # photo-sort CLI
//!
//! Command-line interface for the photo inbox sorter.
//!
//! ## Usage
//! ```bash
//! photo-sort sort ~/Dropbox/Camera\ Uploads --output ~/Pictures/library
//! photo-sort sort --config ~/.config/photo-sort/config.json --dry-run
//! photo-sort rebuild --output ~/Pictures/library
//! ```

mod cli;

use photo_inbox_sorter::Result;

fn main() -> Result<()> {
    cli::run()
}
