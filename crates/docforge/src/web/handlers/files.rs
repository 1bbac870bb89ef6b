//! Download of finished artifacts

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;

use crate::{
    errors::{AppError, AppResult},
    web::AppState,
};

const NOT_FOUND_MESSAGE: &str = "File not found or expired";

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "zip" => "application/zip",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Stream a file from the output area as an attachment
pub async fn serve_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let path = state.workspace.resolve_output(&name)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::not_found(NOT_FOUND_MESSAGE)),
        Err(e) => return Err(AppError::Workspace(e.into())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| AppError::Workspace(e.into()))?;
    // Scratch directories live in the output area too
    if !metadata.is_file() {
        return Err(AppError::not_found(NOT_FOUND_MESSAGE));
    }

    tracing::debug!("Serving {:?} ({} bytes)", path, metadata.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(format!("Failed to build response: {e}")))
}
