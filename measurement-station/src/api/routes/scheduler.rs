//! Scheduler routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::SchedulerStatusResponse;
use crate::api::server::AppState;

/// Create the scheduler router.
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(get_status))
}

async fn get_status(State(state): State<AppState>) -> ApiResult<Json<SchedulerStatusResponse>> {
    let scheduler = state
        .scheduler
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Scheduler not available"))?;
    let snapshot = scheduler.fetch_snapshot().await?;
    Ok(Json(snapshot.into()))
}
