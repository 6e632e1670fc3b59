//! Hardware capture extension point.
//!
//! The acquisition lifecycle persists an attempt and then hands it to a
//! [`CaptureDevice`]. Real camera drivers plug in here without touching the
//! scheduler.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::MeasurementAttempt;

/// A camera channel that can be started for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureChannel {
    Rgb,
    Multispectral,
}

/// Result of a capture request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureOutcome {
    pub attempt_id: String,
    /// Channels that were started.
    pub started: Vec<CaptureChannel>,
    /// Exposure length in minutes.
    pub length_of_ae: f64,
}

impl CaptureOutcome {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

/// Error type for capture operations.
#[derive(Debug, Clone)]
pub struct CaptureError {
    pub message: String,
}

impl CaptureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CaptureError {}

/// Trait for hardware that records a measurement.
#[async_trait]
pub trait CaptureDevice: Send + Sync + 'static {
    async fn capture(&self, attempt: &MeasurementAttempt) -> Result<CaptureOutcome, CaptureError>;
}

/// Stand-in device used until camera drivers are integrated.
///
/// Reports the channels the attempt asks for without touching any hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderCapture;

#[async_trait]
impl CaptureDevice for PlaceholderCapture {
    async fn capture(&self, attempt: &MeasurementAttempt) -> Result<CaptureOutcome, CaptureError> {
        let mut started = Vec::with_capacity(2);
        if attempt.rgb_camera {
            tracing::info!(
                attempt_id = %attempt.id,
                date_time = %attempt.date_time,
                length_of_ae = attempt.length_of_ae,
                "Starting RGB measurement (placeholder)"
            );
            started.push(CaptureChannel::Rgb);
        }
        if attempt.multispectral_camera {
            tracing::info!(
                attempt_id = %attempt.id,
                length_of_ae = attempt.length_of_ae,
                "Starting multispectral measurement (placeholder)"
            );
            started.push(CaptureChannel::Multispectral);
        }

        Ok(CaptureOutcome {
            attempt_id: attempt.id.clone(),
            started,
            length_of_ae: attempt.length_of_ae,
        })
    }
}
