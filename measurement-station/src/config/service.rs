//! Configuration service.
//!
//! Owns reads and writes of the measurement configuration and keeps the
//! scheduler in step with it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::Result;
use crate::database::repositories::ConfigRepository;
use crate::domain::MeasurementConfig;
use crate::scheduler::{ScheduleSnapshot, SchedulerHandle};

/// Validates, persists and propagates measurement configuration changes.
pub struct ConfigService {
    repo: Arc<dyn ConfigRepository>,
    scheduler: SchedulerHandle,
    /// Serializes compare, persist and reschedule across concurrent updates.
    update_lock: Mutex<()>,
}

impl ConfigService {
    pub fn new(repo: Arc<dyn ConfigRepository>, scheduler: SchedulerHandle) -> Self {
        Self {
            repo,
            scheduler,
            update_lock: Mutex::new(()),
        }
    }

    /// Current configuration.
    pub async fn get_config(&self) -> Result<MeasurementConfig> {
        self.repo.get_measurement_config().await
    }

    /// Replace the configuration.
    ///
    /// Invalid updates are rejected before anything is written. The scheduler
    /// is re-armed only when the frequency changed. A scheduler that cannot be
    /// reached is logged; the stored configuration is still returned.
    pub async fn replace_config(&self, update: MeasurementConfig) -> Result<MeasurementConfig> {
        let candidate = update.normalized();
        candidate.validate()?;

        let _guard = self.update_lock.lock().await;

        let previous = self.repo.get_measurement_config().await?;
        let saved = self.repo.replace_measurement_config(&candidate).await?;
        let rescheduled = previous.frequency_changed(&saved);

        info!(
            frequency_minutes = saved.frequency_minutes,
            previous_frequency_minutes = previous.frequency_minutes,
            rescheduled,
            "Measurement configuration updated"
        );

        if rescheduled {
            match self
                .scheduler
                .set_schedule(saved.frequency_minutes, saved.first_measurement)
                .await
            {
                Ok(snapshot) => info!(
                    phase = %snapshot.phase,
                    next_fire_time = ?snapshot.next_fire_time,
                    "Scheduler re-armed after frequency change"
                ),
                Err(e) => error!(error = %e, "Failed to re-arm scheduler after config update"),
            }
        }

        Ok(saved)
    }

    /// Arm the scheduler from the stored configuration.
    pub async fn restore_schedule(&self) -> Result<ScheduleSnapshot> {
        let _guard = self.update_lock.lock().await;
        let config = self.repo.get_measurement_config().await?;
        let snapshot = self
            .scheduler
            .set_schedule(config.frequency_minutes, config.first_measurement)
            .await?;

        info!(
            frequency_minutes = config.frequency_minutes,
            first_measurement = %config.first_measurement,
            next_fire_time = ?snapshot.next_fire_time,
            "Scheduler restored from stored configuration"
        );

        Ok(snapshot)
    }
}
