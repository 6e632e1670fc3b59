//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::{ComponentHealth, HealthResponse};
use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

async fn database_health(state: &AppState) -> Option<ComponentHealth> {
    let pool = state.pool.as_ref()?;
    let result = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await;
    Some(match result {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            message: None,
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            message: Some(e.to_string()),
        },
    })
}

fn scheduler_health(state: &AppState) -> Option<ComponentHealth> {
    let scheduler = state.scheduler.as_ref()?;
    let snapshot = scheduler.snapshot();
    Some(if scheduler.is_running() {
        ComponentHealth {
            name: "scheduler".to_string(),
            status: "healthy".to_string(),
            message: Some(format!("phase: {}", snapshot.phase)),
        }
    } else {
        ComponentHealth {
            name: "scheduler".to_string(),
            status: "unhealthy".to_string(),
            message: Some("scheduler actor stopped".to_string()),
        }
    })
}

async fn components(state: &AppState) -> Vec<ComponentHealth> {
    let mut components = Vec::with_capacity(2);
    components.extend(database_health(state).await);
    components.extend(scheduler_health(state));
    components
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let components = components(&state).await;
    let status = if components.iter().all(|c| c.status == "healthy") {
        "healthy"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        components,
    }))
}

/// Readiness check. 503 when any component is unhealthy.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = components(&state)
        .await
        .iter()
        .all(|c| c.status == "healthy");
    if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Liveness check.
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}
