//! Service container for dependency injection.
//!
//! The ServiceContainer builds every application service once, hands out
//! the shared scheduler handle and manages startup and shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::legacy::{DEFAULT_LEGACY_CONFIG_PATH, import_legacy_config};
use crate::Result;
use crate::acquisition::{AcquisitionLifecycle, CaptureDevice, PlaceholderCapture};
use crate::api::AppState;
use crate::config::ConfigService;
use crate::database::DbPool;
use crate::database::repositories::{
    MeasurementRepository, SqlxConfigRepository, SqlxMeasurementRepository,
};
use crate::logging::LoggingConfig;
use crate::scheduler::{ActorOutcome, DEFAULT_SHUTDOWN_TIMEOUT, ScheduleActor, SchedulerHandle};

/// Startup behaviour of the container.
#[derive(Debug, Clone)]
pub struct ServiceContainerConfig {
    /// Arm the scheduler from the stored configuration on start.
    pub restore_schedule_on_start: bool,
    /// Legacy JSON configuration to import on start, if present.
    pub legacy_config_path: Option<PathBuf>,
    /// How long shutdown waits for an in-flight measurement.
    pub scheduler_shutdown_timeout: Duration,
}

impl Default for ServiceContainerConfig {
    fn default() -> Self {
        Self {
            restore_schedule_on_start: true,
            legacy_config_path: None,
            scheduler_shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServiceContainerConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `SCHEDULER_RESTORE_ON_START` (`true`/`false`)
    /// - `LEGACY_CONFIG_PATH` (empty disables the import)
    /// - `SCHEDULER_SHUTDOWN_TIMEOUT_SECS` (seconds)
    pub fn from_env_or_default() -> Self {
        let mut config = Self {
            legacy_config_path: Some(PathBuf::from(DEFAULT_LEGACY_CONFIG_PATH)),
            ..Self::default()
        };

        if let Ok(value) = std::env::var("SCHEDULER_RESTORE_ON_START") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.restore_schedule_on_start = true,
                "0" | "false" | "no" | "off" => config.restore_schedule_on_start = false,
                _ => warn!(value = %value, "Invalid SCHEDULER_RESTORE_ON_START, using default"),
            }
        }
        if let Ok(path) = std::env::var("LEGACY_CONFIG_PATH") {
            config.legacy_config_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(value) = std::env::var("SCHEDULER_SHUTDOWN_TIMEOUT_SECS") {
            match value.trim().parse::<u64>() {
                Ok(secs) => config.scheduler_shutdown_timeout = Duration::from_secs(secs),
                Err(_) => warn!(
                    value = %value,
                    "Invalid SCHEDULER_SHUTDOWN_TIMEOUT_SECS, using default"
                ),
            }
        }
        config
    }
}

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: DbPool,
    /// Configuration service.
    pub config_service: Arc<ConfigService>,
    /// Acquisition lifecycle, shared by the scheduler and manual triggers.
    pub lifecycle: Arc<AcquisitionLifecycle>,
    /// Measurement repository.
    pub measurement_repo: Arc<dyn MeasurementRepository>,
    scheduler: SchedulerHandle,
    scheduler_task: Mutex<Option<JoinHandle<ActorOutcome>>>,
    config: ServiceContainerConfig,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Create a container with default settings and the placeholder capture.
    pub fn new(pool: DbPool) -> Self {
        Self::with_config(pool, ServiceContainerConfig::default())
    }

    pub fn with_config(pool: DbPool, config: ServiceContainerConfig) -> Self {
        Self::with_capture(pool, config, Arc::new(PlaceholderCapture))
    }

    /// Create a container with a specific capture device.
    ///
    /// Spawns the scheduler actor, so this must run inside a Tokio runtime.
    pub fn with_capture(
        pool: DbPool,
        config: ServiceContainerConfig,
        capture: Arc<dyn CaptureDevice>,
    ) -> Self {
        info!("Initializing service container");

        let config_repo = Arc::new(SqlxConfigRepository::new(pool.clone()));
        let measurement_repo: Arc<dyn MeasurementRepository> =
            Arc::new(SqlxMeasurementRepository::new(pool.clone()));

        let lifecycle = Arc::new(AcquisitionLifecycle::new(
            config_repo.clone(),
            measurement_repo.clone(),
            capture,
        ));

        let cancellation_token = CancellationToken::new();
        let (actor, scheduler) =
            ScheduleActor::new(lifecycle.clone(), cancellation_token.child_token());
        let scheduler_task =
            tokio::spawn(actor.with_shutdown_timeout(config.scheduler_shutdown_timeout).run());

        let config_service = Arc::new(ConfigService::new(config_repo, scheduler.clone()));

        info!("Service container initialized");

        Self {
            pool,
            config_service,
            lifecycle,
            measurement_repo,
            scheduler,
            scheduler_task: Mutex::new(Some(scheduler_task)),
            config,
            cancellation_token,
        }
    }

    /// The process-wide scheduler handle. Every caller gets the same actor.
    pub fn scheduler(&self) -> SchedulerHandle {
        self.scheduler.clone()
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Start background work.
    ///
    /// Imports a legacy config file if one is configured, then arms the
    /// scheduler from the stored configuration. Failures here are logged;
    /// the API stays usable and a later config update re-arms the scheduler.
    pub async fn start(&self) -> Result<()> {
        info!("Starting services");

        if let Some(path) = &self.config.legacy_config_path {
            match import_legacy_config(&self.config_service, path).await {
                Ok(Some(_)) => {}
                Ok(None) => debug!(path = %path.display(), "No legacy config to import"),
                Err(e) => error!(path = %path.display(), error = %e, "Legacy config import failed"),
            }
        }

        if self.config.restore_schedule_on_start {
            if let Err(e) = self.config_service.restore_schedule().await {
                error!(error = %e, "Failed to restore measurement schedule");
            }
        } else {
            info!("Schedule restore disabled; scheduler stays idle until configured");
        }

        info!("Services started");
        Ok(())
    }

    /// Build API state backed by this container.
    pub fn app_state(&self, logging_config: Option<Arc<LoggingConfig>>) -> AppState {
        let state = AppState::new()
            .with_config_service(self.config_service.clone())
            .with_lifecycle(self.lifecycle.clone())
            .with_measurement_repository(self.measurement_repo.clone())
            .with_scheduler(self.scheduler())
            .with_pool(self.pool.clone());

        match logging_config {
            Some(config) => state.with_logging_config(config),
            None => state,
        }
    }

    /// Shutdown all services gracefully.
    ///
    /// Stops the scheduler, waits for in-flight ticks and closes the pool.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down services");

        self.cancellation_token.cancel();

        let task = self.scheduler_task.lock().take();
        if let Some(task) = task {
            match task.await {
                Ok(outcome) => info!(?outcome, "Scheduler stopped"),
                Err(e) => warn!(error = %e, "Scheduler task ended abnormally"),
            }
        }

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
        Ok(())
    }
}
