//! Database models.
//!
//! Row structs mapping the schema one to one, with conversions to and from
//! the domain types.

pub mod config;
pub mod measurement;

pub use config::*;
pub use measurement::*;
