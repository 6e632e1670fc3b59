//! Domain layer.
//!
//! Configuration and attempt records shared by the scheduler, the acquisition
//! lifecycle and the API.

pub mod measurement_attempt;
pub mod measurement_config;

pub use measurement_attempt::{MeasurementAttempt, TriggerKind};
pub use measurement_config::{MAX_FREQUENCY_MINUTES, MAX_SENSORS, MeasurementConfig};
