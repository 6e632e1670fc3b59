//! Timing behaviour of the measurement scheduler, driven on a paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use measurement_station::config::ConfigService;
use measurement_station::database::repositories::ConfigRepository;
use measurement_station::domain::{MeasurementAttempt, MeasurementConfig, TriggerKind};
use measurement_station::scheduler::{
    AcquisitionRunner, ActorOutcome, DEFAULT_SHUTDOWN_TIMEOUT, SchedulePhase, ScheduleActor,
    SchedulerHandle,
};
use measurement_station::{Error, Result};

const MINUTE: Duration = Duration::from_secs(60);
const SLACK: Duration = Duration::from_secs(1);

#[derive(Default)]
struct CountingRunner {
    calls: AtomicUsize,
    scheduled_calls: AtomicUsize,
    fail_first: usize,
}

impl CountingRunner {
    fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionRunner for CountingRunner {
    async fn run(&self, scheduled: bool) -> Result<MeasurementAttempt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if scheduled {
            self.scheduled_calls.fetch_add(1, Ordering::SeqCst);
        }
        if call < self.fail_first {
            return Err(Error::Database("database is locked".into()));
        }
        Ok(MeasurementAttempt::begin(
            &MeasurementConfig::default(),
            TriggerKind::from_scheduled(scheduled),
        ))
    }
}

/// Holds the first acquisition until `release` is called.
#[derive(Default)]
struct GatedRunner {
    calls: AtomicUsize,
    completed: AtomicUsize,
    gate: Notify,
}

impl GatedRunner {
    fn release(&self) {
        self.gate.notify_one();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionRunner for GatedRunner {
    async fn run(&self, scheduled: bool) -> Result<MeasurementAttempt> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(MeasurementAttempt::begin(
            &MeasurementConfig::default(),
            TriggerKind::from_scheduled(scheduled),
        ))
    }
}

#[derive(Default)]
struct MemoryConfigRepository {
    config: Mutex<Option<MeasurementConfig>>,
}

#[async_trait]
impl ConfigRepository for MemoryConfigRepository {
    async fn get_measurement_config(&self) -> Result<MeasurementConfig> {
        let mut config = self.config.lock().await;
        Ok(config.get_or_insert_with(MeasurementConfig::default).clone())
    }

    async fn replace_measurement_config(
        &self,
        config: &MeasurementConfig,
    ) -> Result<MeasurementConfig> {
        *self.config.lock().await = Some(config.clone());
        Ok(config.clone())
    }
}

fn spawn_scheduler(runner: CountingRunner) -> (SchedulerHandle, Arc<CountingRunner>) {
    let runner = Arc::new(runner);
    let (handle, _join) = ScheduleActor::spawn(runner.clone(), CancellationToken::new());
    (handle, runner)
}

fn past() -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::days(3)
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    // Let spawned ticks finish and report back.
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn past_start_fires_one_interval_after_now() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());
    let before = Utc::now();

    let snapshot = handle.set_schedule(10.0, past()).await.unwrap();

    assert_eq!(snapshot.phase, SchedulePhase::Recurring);
    let next = snapshot.next_fire_time.unwrap();
    assert!((next - (before + chrono::Duration::minutes(10))).num_seconds().abs() <= 1);

    advance(10 * MINUTE - SLACK).await;
    assert_eq!(runner.calls(), 0);

    advance(2 * SLACK).await;
    assert_eq!(runner.calls(), 1);
    assert_eq!(runner.scheduled_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn future_start_fires_at_start_then_recurs() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());
    let start = Utc::now() + chrono::Duration::minutes(5);

    let snapshot = handle.set_schedule(10.0, start).await.unwrap();

    assert_eq!(snapshot.phase, SchedulePhase::PendingStart);
    assert_eq!(snapshot.next_fire_time, Some(start));

    advance(5 * MINUTE - SLACK).await;
    assert_eq!(runner.calls(), 0);

    advance(2 * SLACK).await;
    assert_eq!(runner.calls(), 1);
    assert_eq!(handle.snapshot().phase, SchedulePhase::Recurring);

    advance(10 * MINUTE).await;
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn non_positive_interval_disables_scheduling() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());

    for interval in [0.0, -5.0, f64::NAN] {
        let snapshot = handle.set_schedule(interval, past()).await.unwrap();
        assert_eq!(snapshot.phase, SchedulePhase::Disabled);
        assert!(handle.next_scheduled_date().is_none());
    }

    advance(Duration::from_secs(24 * 60 * 60)).await;
    assert_eq!(runner.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn rapid_reconfiguration_keeps_only_last_schedule() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());

    handle.set_schedule(5.0, past()).await.unwrap();
    let snapshot = handle.set_schedule(10.0, past()).await.unwrap();
    assert_eq!(snapshot.interval_minutes, 10.0);

    advance(6 * MINUTE).await;
    assert_eq!(runner.calls(), 0);

    advance(4 * MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);

    advance(5 * MINUTE).await;
    assert_eq!(runner.calls(), 1);

    advance(5 * MINUTE).await;
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_tick_does_not_stop_schedule() {
    let (handle, runner) = spawn_scheduler(CountingRunner::failing_first(1));

    handle.set_schedule(1.0, past()).await.unwrap();

    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.ticks_failed, 1);
    assert!(snapshot.last_error.is_some());
    assert_eq!(snapshot.phase, SchedulePhase::Recurring);

    advance(MINUTE).await;
    assert_eq!(runner.calls(), 2);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.ticks_fired, 2);
    assert_eq!(snapshot.ticks_failed, 1);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn disabling_stops_further_ticks() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());

    handle.set_schedule(10.0, past()).await.unwrap();
    advance(30 * MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 3);

    handle.set_schedule(0.0, past()).await.unwrap();
    advance(60 * MINUTE).await;

    assert_eq!(runner.calls(), 3);
    assert!(handle.next_scheduled_date().is_none());
}

#[tokio::test(start_paused = true)]
async fn one_minute_interval_never_double_fires() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());

    handle.set_schedule(1.0, past()).await.unwrap();
    handle.set_schedule(1.0, past()).await.unwrap();

    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);

    advance(2 * MINUTE).await;
    assert_eq!(runner.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn sub_minute_interval_uses_seconds() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());

    handle.set_schedule(0.5, past()).await.unwrap();

    advance(Duration::from_secs(61)).await;
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn frequency_change_through_config_service_reschedules() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());
    let repo = Arc::new(MemoryConfigRepository::default());
    let service = ConfigService::new(repo, handle.clone());

    repo_config(&service, 60.0).await;
    service.restore_schedule().await.unwrap();
    assert_eq!(handle.snapshot().interval_minutes, 60.0);

    advance(20 * MINUTE).await;
    let before = Utc::now();
    repo_config(&service, 30.0).await;

    let next = handle.next_scheduled_date().unwrap();
    assert!((next - (before + chrono::Duration::minutes(30))).num_seconds().abs() <= 1);

    advance(29 * MINUTE).await;
    assert_eq!(runner.calls(), 0);

    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);

    // The old 60 minute deadline passes without a tick.
    advance(10 * MINUTE).await;
    assert_eq!(runner.calls(), 1);

    advance(20 * MINUTE).await;
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn unchanged_frequency_keeps_running_schedule() {
    let (handle, runner) = spawn_scheduler(CountingRunner::default());
    let repo = Arc::new(MemoryConfigRepository::default());
    let service = ConfigService::new(repo, handle.clone());

    repo_config(&service, 10.0).await;
    service.restore_schedule().await.unwrap();
    let armed = handle.next_scheduled_date();

    advance(5 * MINUTE).await;
    service
        .replace_config(MeasurementConfig {
            frequency_minutes: 10.0,
            first_measurement: past(),
            number_of_sensors: 7,
            length_of_ae: 2.0,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(handle.next_scheduled_date(), armed);
    advance(5 * MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconfigure_during_running_tick_rearms_immediately() {
    let runner = Arc::new(GatedRunner::default());
    let (handle, _join) = ScheduleActor::spawn(runner.clone(), CancellationToken::new());

    handle.set_schedule(1.0, past()).await.unwrap();
    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);
    assert_eq!(runner.completed(), 0);

    // The first acquisition is still blocked; reconfiguring must not wait for it.
    let before = Utc::now();
    let snapshot = handle.set_schedule(5.0, past()).await.unwrap();
    assert_eq!(snapshot.interval_minutes, 5.0);
    assert_eq!(snapshot.ticks_fired, 1);
    assert!(snapshot.last_tick_at.is_none());
    let next = snapshot.next_fire_time.unwrap();
    assert!((next - (before + chrono::Duration::minutes(5))).num_seconds().abs() <= 1);

    runner.release();
    advance(SLACK).await;
    assert_eq!(runner.completed(), 1);
    let snapshot = handle.snapshot();
    assert!(snapshot.last_tick_at.is_some());
    assert_eq!(snapshot.ticks_failed, 0);
    assert_eq!(snapshot.interval_minutes, 5.0);

    // The old one minute timer is gone; only the new five minute one fires.
    advance(5 * MINUTE - 2 * SLACK).await;
    assert_eq!(runner.calls(), 1);

    advance(2 * SLACK).await;
    assert_eq!(runner.calls(), 2);
    assert_eq!(runner.completed(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_lets_running_tick_finish() {
    let runner = Arc::new(GatedRunner::default());
    let (handle, join) = ScheduleActor::spawn(runner.clone(), CancellationToken::new());

    handle.set_schedule(1.0, past()).await.unwrap();
    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);

    handle.cancel();
    advance(SLACK).await;
    assert!(!join.is_finished());
    assert_eq!(runner.completed(), 0);
    assert!(!handle.snapshot().is_active());

    runner.release();
    assert_eq!(join.await.unwrap(), ActorOutcome::Cancelled);
    assert_eq!(runner.completed(), 1);
    let snapshot = handle.snapshot();
    assert!(snapshot.last_tick_at.is_some());
    assert_eq!(snapshot.ticks_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_timeout_aborts_stuck_tick() {
    let runner = Arc::new(GatedRunner::default());
    let (actor, handle) = ScheduleActor::new(runner.clone(), CancellationToken::new());
    let join = tokio::spawn(actor.with_shutdown_timeout(Duration::from_secs(5)).run());

    handle.set_schedule(1.0, past()).await.unwrap();
    advance(MINUTE + SLACK).await;
    assert_eq!(runner.calls(), 1);

    let cancelled_at = tokio::time::Instant::now();
    handle.cancel();
    assert_eq!(join.await.unwrap(), ActorOutcome::Cancelled);

    let waited = cancelled_at.elapsed();
    assert!(waited >= Duration::from_secs(5));
    assert!(waited < DEFAULT_SHUTDOWN_TIMEOUT);
    assert_eq!(runner.completed(), 0);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.ticks_failed, 1);
    assert!(snapshot.last_error.is_some());
}

async fn repo_config(service: &ConfigService, frequency_minutes: f64) {
    service
        .replace_config(MeasurementConfig {
            frequency_minutes,
            first_measurement: past(),
            length_of_ae: 2.0,
            ..Default::default()
        })
        .await
        .unwrap();
}
