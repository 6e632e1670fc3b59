//! End-to-end tests against an in-memory SQLite database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use measurement_station::Error;
use measurement_station::acquisition::{AcquisitionLifecycle, PlaceholderCapture};
use measurement_station::api::{ApiServer, ApiServerConfig};
use measurement_station::database::repositories::{
    ConfigRepository, MeasurementRepository, SqlxConfigRepository, SqlxMeasurementRepository,
};
use measurement_station::database::{DbPool, init_pool_with_size, run_migrations};
use measurement_station::domain::{MeasurementAttempt, MeasurementConfig, TriggerKind};
use measurement_station::services::{ServiceContainer, ServiceContainerConfig};

async fn setup_test_db() -> DbPool {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

fn attempt_at(minutes_ago: i64) -> MeasurementAttempt {
    let mut attempt = MeasurementAttempt::begin(&MeasurementConfig::default(), TriggerKind::Scheduled);
    attempt.date_time = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap()
        - Duration::minutes(minutes_ago);
    attempt
}

// ============================================================================
// Repositories
// ============================================================================

#[tokio::test]
async fn test_config_repository_creates_default() {
    let pool = setup_test_db().await;
    let repo = SqlxConfigRepository::new(pool);

    let config = repo.get_measurement_config().await.unwrap();

    assert_eq!(config, MeasurementConfig::default());
    // A second read returns the same row.
    assert_eq!(repo.get_measurement_config().await.unwrap(), config);
}

#[tokio::test]
async fn test_config_repository_replace() {
    let pool = setup_test_db().await;
    let repo = SqlxConfigRepository::new(pool);

    let update = MeasurementConfig {
        frequency_minutes: 15.5,
        first_measurement: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        rgb_camera: false,
        multispectral_camera: false,
        number_of_sensors: 8,
        length_of_ae: 3.0,
    };
    let saved = repo.replace_measurement_config(&update).await.unwrap();

    assert_eq!(saved, update);
    assert_eq!(repo.get_measurement_config().await.unwrap(), update);
}

#[tokio::test]
async fn test_measurement_repository_ordering_and_range() {
    let pool = setup_test_db().await;
    let repo = SqlxMeasurementRepository::new(pool);

    let oldest = repo.save_attempt(&attempt_at(30)).await.unwrap();
    let newest = repo.save_attempt(&attempt_at(0)).await.unwrap();
    let middle = repo.save_attempt(&attempt_at(10)).await.unwrap();

    let latest = repo.latest_attempts(5).await.unwrap();
    let ids: Vec<_> = latest.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![newest.id.as_str(), middle.id.as_str(), oldest.id.as_str()]);

    let page = repo.list_attempts(1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, middle.id);
    assert_eq!(repo.count_attempts().await.unwrap(), 3);

    let range = repo
        .attempts_between(middle.date_time, newest.date_time)
        .await
        .unwrap();
    let ids: Vec<_> = range.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![newest.id.as_str(), middle.id.as_str()]);
}

#[tokio::test]
async fn test_measurement_repository_get_missing() {
    let pool = setup_test_db().await;
    let repo = SqlxMeasurementRepository::new(pool);

    let err = repo.get_attempt("does-not-exist").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_lifecycle_snapshots_current_config() {
    let pool = setup_test_db().await;
    let config_repo = Arc::new(SqlxConfigRepository::new(pool.clone()));
    let measurement_repo = Arc::new(SqlxMeasurementRepository::new(pool));
    let lifecycle = AcquisitionLifecycle::new(
        config_repo.clone(),
        measurement_repo.clone(),
        Arc::new(PlaceholderCapture),
    );

    config_repo
        .replace_measurement_config(&MeasurementConfig {
            number_of_sensors: 4,
            length_of_ae: 2.5,
            ..Default::default()
        })
        .await
        .unwrap();

    let attempt = lifecycle.trigger_now().await.unwrap();

    assert!(!attempt.scheduled);
    assert_eq!(attempt.number_of_sensors, 4);
    assert_eq!(attempt.length_of_ae, 2.5);
    assert_eq!(measurement_repo.get_attempt(&attempt.id).await.unwrap(), attempt);
}

// ============================================================================
// HTTP API
// ============================================================================

async fn test_app() -> (Router, ServiceContainer) {
    let pool = setup_test_db().await;
    let container = ServiceContainer::with_config(
        pool,
        ServiceContainerConfig {
            restore_schedule_on_start: true,
            ..Default::default()
        },
    );
    container.start().await.unwrap();

    let server = ApiServer::with_state(ApiServerConfig::default(), container.app_state(None));
    (server.build_router(), container)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::put(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_get_measurement_config() {
    let (app, container) = test_app().await;

    let (status, body) = send(&app, get("/api/settings/measurement-config")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frequency_minutes"], 60.0);
    assert_eq!(body["multispectral_camera"], false);
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_put_measurement_config_rejects_invalid() {
    let (app, container) = test_app().await;

    let (status, body) = send(
        &app,
        put_json(
            "/api/settings/measurement-config",
            json!({
                "frequency_minutes": 5,
                "first_measurement": "2024-01-01T00:00:00Z",
                "length_of_ae": 10
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, stored) = send(&app, get("/api/settings/measurement-config")).await;
    assert_eq!(stored["frequency_minutes"], 60.0);
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_put_measurement_config_reschedules() {
    let (app, container) = test_app().await;
    let before = Utc::now();

    let (status, body) = send(
        &app,
        put_json(
            "/api/settings/measurement-config",
            json!({
                "frequency_minutes": 30,
                "first_measurement": "2024-01-01T00:00:00Z",
                "rgb_camera": true,
                "multispectral_camera": true,
                "number_of_sensors": 2,
                "length_of_ae": 5
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frequency_minutes"], 30.0);
    assert_eq!(body["multispectral_camera"], false);

    let (status, status_body) = send(&app, get("/api/scheduler/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["active"], true);
    assert_eq!(status_body["phase"], "recurring");
    assert_eq!(status_body["interval_minutes"], 30.0);

    let next = container.scheduler().next_scheduled_date().unwrap();
    assert!((next - (before + Duration::minutes(30))).num_seconds().abs() <= 2);
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_manual_measurement_and_latest() {
    let (app, container) = test_app().await;

    let request = Request::post("/api/measurements/start")
        .body(Body::empty())
        .unwrap();
    let (status, created) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["scheduled"], false);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, latest) = send(&app, get("/api/measurements/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["measurements"].as_array().unwrap().len(), 1);
    assert_eq!(latest["measurements"][0]["id"], id.as_str());
    assert_eq!(latest["last_measurement"], created["date_time"]);
    assert!(latest["planned_measurement"].is_string());
    assert!(latest["last_backup"].is_null());

    let (status, fetched) = send(&app, get(&format!("/api/measurements/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, page) = send(&app, get("/api/measurements?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 10);
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_get_missing_measurement_is_404() {
    let (app, container) = test_app().await;

    let (status, body) = send(&app, get("/api/measurements/unknown-id")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_history_range() {
    let (app, container) = test_app().await;
    for minutes_ago in [0, 60, 24 * 60] {
        container
            .measurement_repo
            .save_attempt(&attempt_at(minutes_ago))
            .await
            .unwrap();
    }

    let (status, body) = send(
        &app,
        get("/api/measurements/history?start_date=2024-06-01T10:00:00Z&end_date=2024-06-01T12:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["measurements"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        get("/api/measurements/history?start_date=2024-06-02T00:00:00Z&end_date=2024-06-01T00:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"].is_object());
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_health_reports_components() {
    let (app, container) = test_app().await;

    let (status, body) = send(&app, get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"].as_array().unwrap().len(), 2);
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_status_after_shutdown_is_503() {
    let (app, container) = test_app().await;

    let (status, _) = send(&app, get("/api/scheduler/status")).await;
    assert_eq!(status, StatusCode::OK);

    container.shutdown().await.unwrap();

    let (status, body) = send(&app, get("/api/scheduler/status")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}
