//! API route modules.

pub mod health;
pub mod logging;
pub mod measurements;
pub mod scheduler;
pub mod settings;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/settings", settings::router())
        .nest("/api/measurements", measurements::router())
        .nest("/api/scheduler", scheduler::router())
        .nest("/api/logging", logging::router())
        .nest("/api/health", health::router())
        .with_state(state)
}
