//! Dataset pipeline behind a vehicle-listings dashboard.
//!
//! Loads a tabular file of vehicle listings, derives a `brand` column from
//! the free-form `model` text at load time, and answers the filter and
//! aggregate queries a presentation layer needs for its metrics, charts,
//! and filter widgets. Rendering is out of scope: any frontend can drive
//! [`session::SessionState`] with user-selected parameters and draw the
//! results however it likes.
//!
//! ```no_run
//! use rusty_lot::data::DatasetCache;
//! use rusty_lot::session::SessionState;
//!
//! # fn main() -> Result<(), rusty_lot::data::PipelineError> {
//! let mut cache = DatasetCache::new();
//! let dataset = cache.load("vehicles_us.csv".as_ref())?;
//!
//! let mut session = SessionState::new(dataset);
//! session.set_price_range(1_000.0, 25_000.0)?;
//! println!("{} listings match", session.visible_count());
//! for (brand, count) in session.top_brands(10) {
//!     println!("{brand}: {count}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod session;
