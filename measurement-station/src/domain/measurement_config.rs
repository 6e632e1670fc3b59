//! Measurement configuration value object.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest accepted measurement frequency (one leap year, in minutes).
pub const MAX_FREQUENCY_MINUTES: f64 = 366.0 * 24.0 * 60.0;

/// Largest accepted number of attached sensors.
pub const MAX_SENSORS: u32 = 100;

/// Configuration snapshot that drives acquisition attempts.
///
/// `frequency_minutes > length_of_ae` holds for every persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Minutes between two scheduled attempts.
    #[serde(alias = "measurement_frequency")]
    pub frequency_minutes: f64,
    /// Anchor time of the first scheduled attempt.
    pub first_measurement: DateTime<Utc>,
    #[serde(default)]
    pub rgb_camera: bool,
    /// Multispectral capture is not supported yet; always stored as `false`.
    #[serde(default)]
    pub multispectral_camera: bool,
    #[serde(default)]
    pub number_of_sensors: u32,
    /// Length of the acquisition event, in minutes.
    pub length_of_ae: f64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            frequency_minutes: 60.0,
            first_measurement: Utc
                .with_ymd_and_hms(2023, 4, 26, 8, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            rgb_camera: true,
            multispectral_camera: false,
            number_of_sensors: 1,
            length_of_ae: 10.0,
        }
    }
}

impl MeasurementConfig {
    /// Apply the storage-side normalization rules.
    ///
    /// Multispectral capture has no hardware backing, so the flag is cleared
    /// regardless of input.
    pub fn normalized(mut self) -> Self {
        self.multispectral_camera = false;
        self
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.frequency_minutes.is_finite() || self.frequency_minutes <= 0.0 {
            return Err(Error::validation(format!(
                "frequency_minutes must be a positive number, got {}",
                self.frequency_minutes
            )));
        }
        if self.frequency_minutes > MAX_FREQUENCY_MINUTES {
            return Err(Error::validation(format!(
                "frequency_minutes must not exceed {} minutes",
                MAX_FREQUENCY_MINUTES
            )));
        }
        if !self.length_of_ae.is_finite() || self.length_of_ae < 0.0 {
            return Err(Error::validation(format!(
                "length_of_ae must be zero or positive, got {}",
                self.length_of_ae
            )));
        }
        if self.frequency_minutes <= self.length_of_ae {
            return Err(Error::validation(format!(
                "Measurement frequency ({}) must be greater than the length of the acquisition event ({})",
                self.frequency_minutes, self.length_of_ae
            )));
        }
        if self.number_of_sensors > MAX_SENSORS {
            return Err(Error::validation(format!(
                "number_of_sensors must be between 0 and {}, got {}",
                MAX_SENSORS, self.number_of_sensors
            )));
        }
        Ok(())
    }

    /// Whether moving from `self` to `next` requires the schedule to be re-armed.
    pub fn frequency_changed(&self, next: &MeasurementConfig) -> bool {
        self.frequency_minutes != next.frequency_minutes
    }
}
