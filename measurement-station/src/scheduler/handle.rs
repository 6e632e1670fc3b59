//! Scheduler handle.
//!
//! The one shared entry point to the schedule actor. Clones are cheap and all
//! talk to the same actor; the service container creates it once and hands it
//! to the config service and the API.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::messages::{ScheduleMessage, ScheduleSnapshot};

/// Default mailbox capacity for the schedule actor.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// Default timeout for send operations when the mailbox is full.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The actor has stopped and is no longer accepting messages.
    ActorStopped,
    /// The send operation timed out on a full mailbox.
    Timeout,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::ActorStopped => write!(f, "Scheduler actor has stopped"),
            SendError::Timeout => write!(f, "Send operation timed out"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<SendError> for crate::Error {
    fn from(err: SendError) -> Self {
        crate::Error::SchedulerUnavailable(err.to_string())
    }
}

/// Handle to the schedule actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<ScheduleMessage>,
    snapshot_rx: watch::Receiver<ScheduleSnapshot>,
    cancellation_token: CancellationToken,
}

impl SchedulerHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<ScheduleMessage>,
        snapshot_rx: watch::Receiver<ScheduleSnapshot>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            sender,
            snapshot_rx,
            cancellation_token,
        }
    }

    /// Replace the active schedule.
    ///
    /// Resolves once the actor has cancelled the previous timer and armed the
    /// new one, returning the resulting state. `interval_minutes <= 0`
    /// disables the schedule.
    pub async fn set_schedule(
        &self,
        interval_minutes: f64,
        start_time: DateTime<Utc>,
    ) -> crate::Result<ScheduleSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ScheduleMessage::Reconfigure {
            interval_minutes,
            start_time,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| SendError::ActorStopped)?)
    }

    /// Next time the timer fires, or `None` when disabled.
    pub fn next_scheduled_date(&self) -> Option<DateTime<Utc>> {
        self.snapshot_rx.borrow().next_fire_time
    }

    /// Latest published state.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Ask the actor for its state through the mailbox.
    ///
    /// Unlike [`snapshot`](Self::snapshot) this fails once the actor is gone.
    pub async fn fetch_snapshot(&self) -> crate::Result<ScheduleSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ScheduleMessage::GetSnapshot { reply }).await?;
        Ok(rx.await.map_err(|_| SendError::ActorStopped)?)
    }

    /// Check if the actor is still accepting messages.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed() && !self.cancellation_token.is_cancelled()
    }

    /// Ask the actor to stop once in-flight ticks finish.
    pub async fn stop(&self) -> Result<(), SendError> {
        self.send(ScheduleMessage::Stop).await
    }

    /// Cancel the actor through its token.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    async fn send(&self, msg: ScheduleMessage) -> Result<(), SendError> {
        self.send_with_timeout(msg, DEFAULT_SEND_TIMEOUT).await
    }

    async fn send_with_timeout(
        &self,
        msg: ScheduleMessage,
        timeout: Duration,
    ) -> Result<(), SendError> {
        // Fast path: try non-blocking send first
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                match tokio::time::timeout(timeout, self.sender.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(msg);
                        Ok(())
                    }
                    Ok(Err(_)) => Err(SendError::ActorStopped),
                    Err(_) => Err(SendError::Timeout),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ActorStopped),
        }
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("running", &self.is_running())
            .field("snapshot", &*self.snapshot_rx.borrow())
            .finish()
    }
}
