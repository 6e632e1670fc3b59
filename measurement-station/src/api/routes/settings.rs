//! Measurement settings routes.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{MeasurementConfigResponse, UpdateMeasurementConfigRequest};
use crate::api::server::AppState;
use crate::config::ConfigService;

/// Create the settings router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/measurement-config",
        get(get_measurement_config).put(update_measurement_config),
    )
}

fn config_service(state: &AppState) -> ApiResult<&Arc<ConfigService>> {
    state
        .config_service
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Config service not available"))
}

async fn get_measurement_config(
    State(state): State<AppState>,
) -> ApiResult<Json<MeasurementConfigResponse>> {
    let config = config_service(&state)?.get_config().await?;
    Ok(Json(config.into()))
}

/// Replace the measurement configuration. Re-arms the scheduler when the
/// frequency changes.
async fn update_measurement_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateMeasurementConfigRequest>,
) -> ApiResult<Json<MeasurementConfigResponse>> {
    let saved = config_service(&state)?
        .replace_config(request.into())
        .await?;
    Ok(Json(saved.into()))
}
