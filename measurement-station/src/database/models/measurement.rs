//! Measurement attempt row.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::domain::MeasurementAttempt;

/// Database model for the `measurement_info` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MeasurementInfoDbModel {
    pub id: String,
    pub date_time: i64,
    pub rgb_camera: bool,
    pub multispectral_camera: bool,
    pub number_of_sensors: i64,
    pub length_of_ae: f64,
    pub scheduled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&MeasurementAttempt> for MeasurementInfoDbModel {
    fn from(attempt: &MeasurementAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            date_time: datetime_to_ms(attempt.date_time),
            rgb_camera: attempt.rgb_camera,
            multispectral_camera: attempt.multispectral_camera,
            number_of_sensors: i64::from(attempt.number_of_sensors),
            length_of_ae: attempt.length_of_ae,
            scheduled: attempt.scheduled,
            created_at: datetime_to_ms(attempt.created_at),
            updated_at: datetime_to_ms(attempt.updated_at),
        }
    }
}

impl From<MeasurementInfoDbModel> for MeasurementAttempt {
    fn from(row: MeasurementInfoDbModel) -> Self {
        Self {
            id: row.id,
            date_time: ms_to_datetime(row.date_time),
            rgb_camera: row.rgb_camera,
            multispectral_camera: row.multispectral_camera,
            number_of_sensors: u32::try_from(row.number_of_sensors).unwrap_or(0),
            length_of_ae: row.length_of_ae,
            scheduled: row.scheduled,
            created_at: ms_to_datetime(row.created_at),
            updated_at: ms_to_datetime(row.updated_at),
        }
    }
}
