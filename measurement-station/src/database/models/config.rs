//! Measurement configuration row.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{datetime_to_ms, ms_to_datetime, now_ms};
use crate::domain::MeasurementConfig;

/// Primary key of the single configuration row.
pub const MEASUREMENT_CONFIG_ID: &str = "measurement";

/// Database model for the `measurement_config` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MeasurementConfigDbModel {
    pub id: String,
    pub frequency_minutes: f64,
    /// Epoch milliseconds.
    pub first_measurement: i64,
    pub rgb_camera: bool,
    pub multispectral_camera: bool,
    pub number_of_sensors: i64,
    pub length_of_ae: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MeasurementConfigDbModel {
    /// Build a row from a domain config, stamping both timestamps with now.
    pub fn from_domain(config: &MeasurementConfig) -> Self {
        let now = now_ms();
        Self {
            id: MEASUREMENT_CONFIG_ID.to_string(),
            frequency_minutes: config.frequency_minutes,
            first_measurement: datetime_to_ms(config.first_measurement),
            rgb_camera: config.rgb_camera,
            multispectral_camera: config.multispectral_camera,
            number_of_sensors: i64::from(config.number_of_sensors),
            length_of_ae: config.length_of_ae,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_domain(self) -> MeasurementConfig {
        MeasurementConfig {
            frequency_minutes: self.frequency_minutes,
            first_measurement: ms_to_datetime(self.first_measurement),
            rgb_camera: self.rgb_camera,
            multispectral_camera: self.multispectral_camera,
            number_of_sensors: u32::try_from(self.number_of_sensors).unwrap_or(0),
            length_of_ae: self.length_of_ae,
        }
    }
}

impl Default for MeasurementConfigDbModel {
    fn default() -> Self {
        Self::from_domain(&MeasurementConfig::default())
    }
}
