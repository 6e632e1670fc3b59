//! Repository layer for database access.

pub mod config;
pub mod measurement;

pub use config::*;
pub use measurement::*;
