//! Schedule actor.
//!
//! A single task owns the schedule state. Reconfiguration, timer expiry and
//! tick completion are all handled inside its run loop, so there is never more
//! than one armed timer and a reconfiguration cannot interleave with the
//! bookkeeping of a tick.
//!
//! Ticks run in their own tasks. A slow or failing acquisition never blocks
//! the mailbox, and a reconfiguration received while a tick runs only affects
//! the next fire.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handle::{DEFAULT_MAILBOX_CAPACITY, SchedulerHandle};
use super::messages::{ScheduleMessage, SchedulePhase, ScheduleSnapshot};
use super::period::RecurrencePeriod;
use super::runner::AcquisitionRunner;
use crate::{Error, Result};

/// Longest single sleep for a deferred start. Longer waits are re-evaluated
/// against the wall clock when the chunk elapses.
pub const MAX_TIMER_CHUNK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How long shutdown waits for in-flight ticks.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Why the actor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorOutcome {
    /// A `Stop` message was received.
    Stopped,
    /// The cancellation token fired.
    Cancelled,
    /// Every handle was dropped.
    HandlesDropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Waiting for the first measurement time. `partial` is set when the wait
    /// was cut to `MAX_TIMER_CHUNK`.
    DeferredStart {
        start_time: DateTime<Utc>,
        partial: bool,
    },
    Recurring,
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    deadline: Instant,
    kind: TimerKind,
}

/// Result of one tick, reported back to the actor.
struct TickReport {
    generation: u64,
    fired_at: DateTime<Utc>,
    outcome: std::result::Result<String, String>,
}

/// Transient schedule bookkeeping. Never persisted.
#[derive(Debug)]
struct ScheduleState {
    phase: SchedulePhase,
    period: Option<RecurrencePeriod>,
    interval_minutes: f64,
    next_fire_time: Option<DateTime<Utc>>,
    timer: Option<ArmedTimer>,
    generation: u64,
    ticks_fired: u64,
    ticks_failed: u64,
    last_tick_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl ScheduleState {
    fn new() -> Self {
        Self {
            phase: SchedulePhase::Disabled,
            period: None,
            interval_minutes: 0.0,
            next_fire_time: None,
            timer: None,
            generation: 0,
            ticks_fired: 0,
            ticks_failed: 0,
            last_tick_at: None,
            last_error: None,
        }
    }

    fn arm(&mut self, deadline: Instant, kind: TimerKind) -> Result<()> {
        if self.timer.is_some() {
            return Err(Error::SchedulingConflict(format!(
                "timer already armed for generation {}",
                self.generation
            )));
        }
        self.timer = Some(ArmedTimer { deadline, kind });
        Ok(())
    }

    fn disable(&mut self) {
        self.timer = None;
        self.phase = SchedulePhase::Disabled;
        self.period = None;
        self.interval_minutes = 0.0;
        self.next_fire_time = None;
    }

    fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            phase: self.phase,
            interval_minutes: self.interval_minutes,
            next_fire_time: self.next_fire_time,
            generation: self.generation,
            ticks_fired: self.ticks_fired,
            ticks_failed: self.ticks_failed,
            last_tick_at: self.last_tick_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Wait for the armed deadline, or forever when nothing is armed.
async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// The schedule actor.
pub struct ScheduleActor {
    runner: Arc<dyn AcquisitionRunner>,
    mailbox: mpsc::Receiver<ScheduleMessage>,
    snapshot_tx: watch::Sender<ScheduleSnapshot>,
    cancellation_token: CancellationToken,
    state: ScheduleState,
    ticks: JoinSet<TickReport>,
    shutdown_timeout: Duration,
}

impl ScheduleActor {
    /// Create the actor and its handle. The actor starts disabled.
    pub fn new(
        runner: Arc<dyn AcquisitionRunner>,
        cancellation_token: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(DEFAULT_MAILBOX_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(ScheduleSnapshot::disabled());
        let handle = SchedulerHandle::new(tx, snapshot_rx, cancellation_token.clone());

        let actor = Self {
            runner,
            mailbox: rx,
            snapshot_tx,
            cancellation_token,
            state: ScheduleState::new(),
            ticks: JoinSet::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        };
        (actor, handle)
    }

    /// Override how long shutdown waits for in-flight ticks.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(
        runner: Arc<dyn AcquisitionRunner>,
        cancellation_token: CancellationToken,
    ) -> (SchedulerHandle, tokio::task::JoinHandle<ActorOutcome>) {
        let (actor, handle) = Self::new(runner, cancellation_token);
        let join = tokio::spawn(actor.run());
        (handle, join)
    }

    /// Run the actor's main loop.
    pub async fn run(mut self) -> ActorOutcome {
        debug!("Schedule actor started");

        let outcome = loop {
            let deadline = self.state.timer.map(|t| t.deadline);

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    break ActorOutcome::Cancelled;
                }

                msg = self.mailbox.recv() => {
                    match msg {
                        Some(ScheduleMessage::Stop) => break ActorOutcome::Stopped,
                        Some(msg) => self.handle_message(msg),
                        None => break ActorOutcome::HandlesDropped,
                    }
                }

                Some(joined) = self.ticks.join_next(), if !self.ticks.is_empty() => {
                    self.record_tick(joined);
                }

                _ = wait_for_deadline(deadline) => {
                    self.on_timer();
                }
            }
        };

        self.state.disable();
        self.publish();
        self.drain_ticks().await;

        info!(outcome = ?outcome, "Schedule actor stopped");
        outcome
    }

    fn handle_message(&mut self, msg: ScheduleMessage) {
        match msg {
            ScheduleMessage::Reconfigure {
                interval_minutes,
                start_time,
                reply,
            } => {
                if let Err(e) = self.reconfigure(interval_minutes, start_time) {
                    error!(error = %e, "Reconfiguration failed; schedule disabled");
                    self.state.disable();
                }
                self.publish();
                let _ = reply.send(self.state.snapshot());
            }
            ScheduleMessage::GetSnapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            ScheduleMessage::Stop => {}
        }
    }

    /// Replace the active schedule.
    ///
    /// The previous timer is dropped first, unconditionally. Ticks already
    /// running are not interrupted.
    fn reconfigure(&mut self, interval_minutes: f64, start_time: DateTime<Utc>) -> Result<()> {
        let cancelled = self.state.timer.take().is_some();
        self.state.generation += 1;

        if cancelled {
            debug!(generation = self.state.generation, "Cancelled previous schedule");
        }

        let Some(period) = RecurrencePeriod::from_minutes(interval_minutes) else {
            self.state.disable();
            info!(
                generation = self.state.generation,
                interval_minutes, "Automatic measurements disabled"
            );
            return Ok(());
        };

        self.state.period = Some(period);
        self.state.interval_minutes = interval_minutes;

        let now = Utc::now();
        if start_time > now {
            self.arm_deferred_start(start_time)?;
            info!(
                generation = self.state.generation,
                interval_minutes,
                %period,
                start_time = %start_time,
                "Measurements scheduled, waiting for first measurement time"
            );
        } else {
            self.arm_recurring(period)?;
            info!(
                generation = self.state.generation,
                interval_minutes,
                %period,
                next_fire_time = ?self.state.next_fire_time,
                "Measurements scheduled"
            );
        }
        Ok(())
    }

    fn arm_deferred_start(&mut self, start_time: DateTime<Utc>) -> Result<()> {
        let delay = (start_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let (delay, partial) = if delay > MAX_TIMER_CHUNK {
            (MAX_TIMER_CHUNK, true)
        } else {
            (delay, false)
        };

        self.state.arm(
            Instant::now() + delay,
            TimerKind::DeferredStart {
                start_time,
                partial,
            },
        )?;
        self.state.phase = SchedulePhase::PendingStart;
        self.state.next_fire_time = Some(start_time);
        Ok(())
    }

    fn arm_recurring(&mut self, period: RecurrencePeriod) -> Result<()> {
        self.state
            .arm(Instant::now() + period.as_duration(), TimerKind::Recurring)?;
        self.state.phase = SchedulePhase::Recurring;
        self.state.next_fire_time = Some(Utc::now() + period.as_chrono());
        Ok(())
    }

    fn on_timer(&mut self) {
        let Some(timer) = self.state.timer.take() else {
            return;
        };

        let result = match timer.kind {
            TimerKind::DeferredStart {
                start_time,
                partial: true,
            } => self.arm_deferred_start(start_time),
            TimerKind::DeferredStart { .. } | TimerKind::Recurring => {
                self.spawn_tick();
                match self.state.period {
                    Some(period) => self.arm_recurring(period),
                    None => Err(Error::SchedulingConflict(
                        "timer fired without a period".to_string(),
                    )),
                }
            }
        };

        if let Err(e) = result {
            error!(error = %e, "Failed to re-arm schedule timer; schedule disabled");
            self.state.disable();
        }
        self.publish();
    }

    fn spawn_tick(&mut self) {
        let runner = self.runner.clone();
        let generation = self.state.generation;
        let fired_at = Utc::now();
        self.state.ticks_fired += 1;

        info!(generation, fired_at = %fired_at, "Running scheduled measurement");

        self.ticks.spawn(async move {
            let outcome = match runner.run(true).await {
                Ok(attempt) => Ok(attempt.id),
                Err(e) => {
                    error!(generation, error = %e, "Scheduled measurement failed");
                    Err(e.to_string())
                }
            };
            TickReport {
                generation,
                fired_at,
                outcome,
            }
        });
    }

    fn record_tick(&mut self, joined: std::result::Result<TickReport, JoinError>) {
        match joined {
            Ok(report) => {
                self.state.last_tick_at = Some(report.fired_at);
                match report.outcome {
                    Ok(attempt_id) => {
                        debug!(
                            generation = report.generation,
                            attempt_id = %attempt_id,
                            "Scheduled measurement completed"
                        );
                        self.state.last_error = None;
                    }
                    Err(message) => {
                        self.state.ticks_failed += 1;
                        self.state.last_error = Some(message);
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Scheduled measurement task aborted");
                self.state.ticks_failed += 1;
                self.state.last_error = Some(e.to_string());
            }
        }
        self.publish();
    }

    async fn drain_ticks(&mut self) {
        if self.ticks.is_empty() {
            return;
        }

        debug!(in_flight = self.ticks.len(), "Waiting for in-flight ticks");
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.ticks.join_next()).await {
                Ok(Some(joined)) => self.record_tick(joined),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        in_flight = self.ticks.len(),
                        "Timed out waiting for in-flight ticks; aborting them"
                    );
                    self.ticks.abort_all();
                    while let Some(joined) = self.ticks.join_next().await {
                        self.record_tick(joined);
                    }
                    break;
                }
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}
