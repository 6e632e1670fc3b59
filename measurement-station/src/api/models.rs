//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MeasurementAttempt, MeasurementConfig};
use crate::scheduler::{SchedulePhase, ScheduleSnapshot};

/// Number of attempts returned by the latest-measurements endpoint.
pub const LATEST_MEASUREMENTS_LIMIT: u32 = 5;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

// ============================================================================
// Pagination
// ============================================================================

/// Pagination query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    /// Number of items to return (default: 20, max: 100)
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of items to skip
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl PaginationParams {
    /// Limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }
}

/// Paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, limit: u32, offset: u32) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

// ============================================================================
// Settings DTOs
// ============================================================================

/// Measurement configuration as exposed over the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementConfigResponse {
    pub frequency_minutes: f64,
    pub first_measurement: DateTime<Utc>,
    pub rgb_camera: bool,
    pub multispectral_camera: bool,
    pub number_of_sensors: u32,
    pub length_of_ae: f64,
}

impl From<MeasurementConfig> for MeasurementConfigResponse {
    fn from(config: MeasurementConfig) -> Self {
        Self {
            frequency_minutes: config.frequency_minutes,
            first_measurement: config.first_measurement,
            rgb_camera: config.rgb_camera,
            multispectral_camera: config.multispectral_camera,
            number_of_sensors: config.number_of_sensors,
            length_of_ae: config.length_of_ae,
        }
    }
}

/// Request to replace the measurement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMeasurementConfigRequest {
    #[serde(alias = "measurement_frequency")]
    pub frequency_minutes: f64,
    pub first_measurement: DateTime<Utc>,
    #[serde(default)]
    pub rgb_camera: bool,
    /// Accepted for compatibility; stored as `false`.
    #[serde(default)]
    pub multispectral_camera: bool,
    #[serde(default)]
    pub number_of_sensors: u32,
    pub length_of_ae: f64,
}

impl From<UpdateMeasurementConfigRequest> for MeasurementConfig {
    fn from(request: UpdateMeasurementConfigRequest) -> Self {
        Self {
            frequency_minutes: request.frequency_minutes,
            first_measurement: request.first_measurement,
            rgb_camera: request.rgb_camera,
            multispectral_camera: request.multispectral_camera,
            number_of_sensors: request.number_of_sensors,
            length_of_ae: request.length_of_ae,
        }
    }
}

// ============================================================================
// Measurement DTOs
// ============================================================================

/// One measurement attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementResponse {
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

impl From<MeasurementAttempt> for MeasurementResponse {
    fn from(attempt: MeasurementAttempt) -> Self {
        Self {
            id: attempt.id,
            date_time: attempt.date_time,
            rgb_camera: attempt.rgb_camera,
            multispectral_camera: attempt.multispectral_camera,
            number_of_sensors: attempt.number_of_sensors,
            length_of_ae: attempt.length_of_ae,
            scheduled: attempt.scheduled,
            created_at: attempt.created_at,
            updated_at: attempt.updated_at,
        }
    }
}

/// Overview of recent and upcoming measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestMeasurementsResponse {
    /// Time of the last data backup. No backup target is configured yet.
    pub last_backup: Option<DateTime<Utc>>,
    pub last_measurement: Option<DateTime<Utc>>,
    /// Next scheduled attempt, if the scheduler is armed.
    pub planned_measurement: Option<DateTime<Utc>>,
    pub measurements: Vec<MeasurementResponse>,
}

/// Date range for the history endpoint. Both bounds are inclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Measurements within a date range, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementHistoryResponse {
    pub measurements: Vec<MeasurementResponse>,
}

// ============================================================================
// Scheduler DTOs
// ============================================================================

/// Scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatusResponse {
    pub active: bool,
    pub phase: SchedulePhase,
    pub next_scheduled_time: Option<DateTime<Utc>>,
    pub interval_minutes: f64,
    pub generation: u64,
    pub ticks_fired: u64,
    pub ticks_failed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<ScheduleSnapshot> for SchedulerStatusResponse {
    fn from(snapshot: ScheduleSnapshot) -> Self {
        Self {
            active: snapshot.is_active(),
            phase: snapshot.phase,
            next_scheduled_time: snapshot.next_fire_time,
            interval_minutes: snapshot.interval_minutes,
            generation: snapshot.generation,
            ticks_fired: snapshot.ticks_fired,
            ticks_failed: snapshot.ticks_failed,
            last_tick_at: snapshot.last_tick_at,
            last_error: snapshot.last_error,
        }
    }
}

// ============================================================================
// Logging DTOs
// ============================================================================

/// Log target description.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

/// Current logging configuration.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

/// Request to change the log filter.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

// ============================================================================
// Health DTOs
// ============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

/// Component health status.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
}
