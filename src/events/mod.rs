//! # Events Module
//!
//! Progress reporting from the core library to whatever UI is listening.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Unit(UnitEvent::Filed { to, .. }) = event {
//!             println!("filed {}", to.display());
//!         }
//!     }
//! });
//!
//! sorter.run_with_events(&mut index, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
