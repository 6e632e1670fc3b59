//! Measurement routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    HistoryQuery, LATEST_MEASUREMENTS_LIMIT, LatestMeasurementsResponse,
    MeasurementHistoryResponse, MeasurementResponse, PaginatedResponse, PaginationParams,
};
use crate::api::server::AppState;
use crate::database::repositories::MeasurementRepository;

/// Create the measurements router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_measurements))
        .route("/latest", get(latest_measurements))
        .route("/history", get(measurement_history))
        .route("/start", post(start_measurement))
        .route("/{id}", get(get_measurement))
}

fn repository(state: &AppState) -> ApiResult<&Arc<dyn MeasurementRepository>> {
    state
        .measurement_repository
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Measurement repository not available"))
}

async fn list_measurements(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<MeasurementResponse>>> {
    let repo = repository(&state)?;
    let limit = params.effective_limit();

    let items = repo.list_attempts(limit, params.offset).await?;
    let total = repo.count_attempts().await?;

    Ok(Json(PaginatedResponse::new(
        items.into_iter().map(MeasurementResponse::from).collect(),
        total,
        limit,
        params.offset,
    )))
}

/// Most recent attempts together with the next planned one.
async fn latest_measurements(
    State(state): State<AppState>,
) -> ApiResult<Json<LatestMeasurementsResponse>> {
    let repo = repository(&state)?;
    let attempts = repo.latest_attempts(LATEST_MEASUREMENTS_LIMIT).await?;

    let last_measurement = attempts.first().map(|a| a.date_time);
    let planned_measurement = state
        .scheduler
        .as_ref()
        .and_then(|scheduler| scheduler.next_scheduled_date());

    Ok(Json(LatestMeasurementsResponse {
        last_backup: None,
        last_measurement,
        planned_measurement,
        measurements: attempts.into_iter().map(MeasurementResponse::from).collect(),
    }))
}

async fn measurement_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<MeasurementHistoryResponse>> {
    if query.start_date > query.end_date {
        return Err(
            ApiError::validation("start_date must not be after end_date").with_details(
                serde_json::json!({
                    "start_date": query.start_date,
                    "end_date": query.end_date,
                }),
            ),
        );
    }

    let attempts = repository(&state)?
        .attempts_between(query.start_date, query.end_date)
        .await?;

    Ok(Json(MeasurementHistoryResponse {
        measurements: attempts.into_iter().map(MeasurementResponse::from).collect(),
    }))
}

/// Run one manual attempt. Failures are returned to the caller.
async fn start_measurement(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<MeasurementResponse>)> {
    let lifecycle = state
        .lifecycle
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Acquisition not available"))?;

    let attempt = lifecycle.trigger_now().await?;
    Ok((StatusCode::CREATED, Json(attempt.into())))
}

async fn get_measurement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MeasurementResponse>> {
    let attempt = repository(&state)?.get_attempt(&id).await?;
    Ok(Json(attempt.into()))
}
