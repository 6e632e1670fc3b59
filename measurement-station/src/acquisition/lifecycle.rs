//! One acquisition attempt, end to end.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::capture::CaptureDevice;
use crate::Result;
use crate::database::repositories::{ConfigRepository, MeasurementRepository};
use crate::domain::{MeasurementAttempt, TriggerKind};
use crate::scheduler::AcquisitionRunner;

/// Creates, persists and captures measurement attempts.
pub struct AcquisitionLifecycle {
    config_repo: Arc<dyn ConfigRepository>,
    measurement_repo: Arc<dyn MeasurementRepository>,
    capture: Arc<dyn CaptureDevice>,
}

impl AcquisitionLifecycle {
    pub fn new(
        config_repo: Arc<dyn ConfigRepository>,
        measurement_repo: Arc<dyn MeasurementRepository>,
        capture: Arc<dyn CaptureDevice>,
    ) -> Self {
        Self {
            config_repo,
            measurement_repo,
            capture,
        }
    }

    /// Run one attempt.
    ///
    /// The configuration is read once so the attempt never mixes two config
    /// versions. Persistence errors are returned; capture errors are logged
    /// and the persisted record is still returned.
    pub async fn execute(&self, trigger: TriggerKind) -> Result<MeasurementAttempt> {
        let config = self.config_repo.get_measurement_config().await?;
        let attempt = MeasurementAttempt::begin(&config, trigger);
        let saved = self.measurement_repo.save_attempt(&attempt).await?;

        info!(
            attempt_id = %saved.id,
            scheduled = saved.scheduled,
            rgb = saved.rgb_camera,
            multispectral = saved.multispectral_camera,
            "Measurement attempt recorded"
        );

        match self.capture.capture(&saved).await {
            Ok(outcome) if outcome.is_empty() => {
                warn!(attempt_id = %saved.id, "No capture channel enabled for attempt");
            }
            Ok(outcome) => {
                info!(attempt_id = %saved.id, channels = ?outcome.started, "Capture started");
            }
            Err(e) => {
                warn!(attempt_id = %saved.id, error = %e, "Capture failed");
            }
        }

        Ok(saved)
    }

    /// Manual trigger. Errors propagate to the caller.
    pub async fn trigger_now(&self) -> Result<MeasurementAttempt> {
        self.execute(TriggerKind::Manual).await
    }
}

#[async_trait]
impl AcquisitionRunner for AcquisitionLifecycle {
    async fn run(&self, scheduled: bool) -> Result<MeasurementAttempt> {
        self.execute(TriggerKind::from_scheduled(scheduled)).await
    }
}
