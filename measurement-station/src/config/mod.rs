//! Measurement configuration management.

pub mod service;

pub use service::ConfigService;
