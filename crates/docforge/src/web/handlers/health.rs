//! Health check HTTP handler

use axum::{Json, extract::State};
use std::collections::BTreeMap;

use crate::web::{AppState, responses::HealthResponse};

/// Reports registry statistics and whether the compression engine can be started
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_available = state.engine.probe().await;
    if !engine_available {
        tracing::warn!("Compression engine '{}' is not available", state.engine.name());
    }

    let mut dependencies = BTreeMap::new();
    dependencies.insert(state.engine.name().to_string(), engine_available);

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        registry: state.workspace.registry().stats().await,
        dependencies,
    })
}
