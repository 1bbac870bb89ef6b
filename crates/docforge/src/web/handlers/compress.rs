//! Single-document compression

use axum::{
    Json,
    extract::{Multipart, State},
};
use tracing::info;

use crate::{
    errors::{AppError, AppResult},
    web::{AppState, extractors::UploadForm, responses::DownloadResponse},
};

/// `POST /api/pdf/compress`
///
/// Takes `file0` (or `file`) and an optional `targetSize` in bytes. With a
/// positive target the quality ladder is searched; otherwise one generic
/// optimization pass runs.
pub async fn compress_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DownloadResponse>> {
    let form = UploadForm::collect(&state.workspace, &mut multipart).await?;
    let upload = form
        .primary_upload()
        .ok_or_else(|| AppError::validation("Failed to read file"))?;
    let target_size = form.parse::<i64>("targetSize")?;

    let outcome = state.search.compress(&upload.path, target_size).await?;
    let file_name = outcome
        .file_name()
        .ok_or_else(|| AppError::internal("Compressed output has no file name"))?;

    info!(
        "Compressed {:?} to {} ({} bytes, {} attempts)",
        upload.original_name, file_name, outcome.size_bytes, outcome.attempts
    );

    let mut response = DownloadResponse::new(state.config.web.download_url(file_name));
    response.size_bytes = Some(outcome.size_bytes);
    response.level = outcome.level;
    response.met_target = Some(outcome.met_target);
    Ok(Json(response))
}
