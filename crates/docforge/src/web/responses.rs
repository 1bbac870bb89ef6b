//! HTTP response types and error mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ephemeral_workspace::{RegistryStats, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::AppError;

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Link to a finished artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub met_target: Option<bool>,
}

impl DownloadResponse {
    pub fn new(download_url: String) -> Self {
        Self {
            download_url,
            size_bytes: None,
            level: None,
            met_target: None,
        }
    }
}

/// Summary of a batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub download_url: String,
    pub processed: usize,
    pub failed: usize,
}

/// Service health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub registry: RegistryStats,
    pub dependencies: BTreeMap<String, bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self).into_response()
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> impl IntoResponse {
    let (status, message) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::NotFound { message } => (StatusCode::NOT_FOUND, message.clone()),
        AppError::Workspace(WorkspaceError::PathValidation { .. }) => {
            (StatusCode::BAD_REQUEST, "Invalid file name".to_string())
        }
        AppError::Workspace(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        AppError::Engine(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        AppError::Compression { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Compression failed: {message}"),
        ),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {message}"),
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {message}"),
        ),
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Request rejected: {}", error);
    }

    (status, Json(ErrorResponse { error: message }))
}
