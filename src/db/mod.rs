//! Database module for modemdash.
//!
//! Provides SQLite storage for modems, proxy configurations and logs.

mod models;
mod store;

pub use models::*;
pub use store::*;
