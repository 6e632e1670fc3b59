//! Scheduler actor messages and published state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// Messages accepted by the schedule actor.
#[derive(Debug)]
pub enum ScheduleMessage {
    /// Replace the active schedule. Replies once the new schedule is armed.
    Reconfigure {
        interval_minutes: f64,
        start_time: DateTime<Utc>,
        reply: oneshot::Sender<ScheduleSnapshot>,
    },
    /// Read the state straight from the actor.
    GetSnapshot { reply: oneshot::Sender<ScheduleSnapshot> },
    /// Stop the actor after in-flight ticks finish.
    Stop,
}

/// Where the schedule is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePhase {
    /// No timer armed.
    Disabled,
    /// Waiting for the configured first measurement time.
    PendingStart,
    /// Firing on the recurring cadence.
    Recurring,
}

impl fmt::Display for SchedulePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::PendingStart => write!(f, "pending_start"),
            Self::Recurring => write!(f, "recurring"),
        }
    }
}

/// Point-in-time view of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleSnapshot {
    pub phase: SchedulePhase,
    /// Active interval; 0 when disabled.
    pub interval_minutes: f64,
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Incremented on every reconfiguration.
    pub generation: u64,
    pub ticks_fired: u64,
    pub ticks_failed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScheduleSnapshot {
    pub fn disabled() -> Self {
        Self {
            phase: SchedulePhase::Disabled,
            interval_minutes: 0.0,
            next_fire_time: None,
            generation: 0,
            ticks_fired: 0,
            ticks_failed: 0,
            last_tick_at: None,
            last_error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != SchedulePhase::Disabled
    }
}

impl Default for ScheduleSnapshot {
    fn default() -> Self {
        Self::disabled()
    }
}
