//! measurement-station library crate.
//!
//! Backend of a measurement station: stores the acquisition configuration,
//! runs an adaptive periodic scheduler that triggers measurement attempts,
//! and exposes both over HTTP.

pub mod acquisition;
pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod services;

pub use error::{Error, Result};
