//! Service health endpoints
//!
//! `/__gtg` answers as long as the process serves HTTP. `/__health` probes
//! every upstream concurrently and reports each one.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use suggest_common::api::{BuildInfo, HealthReport};

use crate::services::run_checks;
use crate::AppState;

pub const SERVICE_NAME: &str = "suggestions-api";

/// GET /__gtg
pub async fn good_to_go() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// GET /__health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let checks = run_checks(&state.health_checks).await;
    let uptime = chrono::Utc::now().signed_duration_since(state.startup_time);

    Json(HealthReport::new(
        SERVICE_NAME,
        format!(
            "Suggests concepts for content from several providers (up {}s)",
            uptime.num_seconds().max(0)
        ),
        checks,
    ))
}

/// GET /__build-info
pub async fn build_info() -> Json<BuildInfo> {
    Json(current_build_info())
}

pub fn current_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    }
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/__gtg", get(good_to_go))
        .route("/__health", get(health))
        .route("/__build-info", get(build_info))
}
