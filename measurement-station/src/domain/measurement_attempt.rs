//! Measurement attempt entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MeasurementConfig;

/// How an acquisition attempt was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fired by the recurring scheduler.
    Scheduled,
    /// Requested through the API.
    Manual,
}

impl TriggerKind {
    pub fn from_scheduled(scheduled: bool) -> Self {
        if scheduled { Self::Scheduled } else { Self::Manual }
    }

    pub fn is_scheduled(self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

/// One execution of the acquisition logic.
///
/// Config fields are copied from the configuration in effect when the attempt
/// started and are never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementAttempt {
    pub id: String,
    pub date_time: DateTime<Utc>,
    pub rgb_camera: bool,
    pub multispectral_camera: bool,
    pub number_of_sensors: u32,
    pub length_of_ae: f64,
    pub scheduled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeasurementAttempt {
    /// Start a new attempt from a configuration snapshot.
    pub fn begin(config: &MeasurementConfig, trigger: TriggerKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            date_time: now,
            rgb_camera: config.rgb_camera,
            multispectral_camera: config.multispectral_camera,
            number_of_sensors: config.number_of_sensors,
            length_of_ae: config.length_of_ae,
            scheduled: trigger.is_scheduled(),
            created_at: now,
            updated_at: now,
        }
    }
}
