//! Acquisition adapter for the scheduler.
//!
//! The scheduler only knows how to ask for an attempt; what an attempt does is
//! behind this trait.

use async_trait::async_trait;

use crate::Result;
use crate::domain::MeasurementAttempt;

/// Trait for running one acquisition attempt.
#[async_trait]
pub trait AcquisitionRunner: Send + Sync + 'static {
    /// Run an attempt. `scheduled` is true when fired by the timer.
    async fn run(&self, scheduled: bool) -> Result<MeasurementAttempt>;
}
