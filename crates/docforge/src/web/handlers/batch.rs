//! Batch jobs: run one operation over several uploads and ship a zip.

use axum::{
    Json,
    extract::{Multipart, State},
};
use std::{collections::HashSet, path::Path};
use tracing::{info, warn};

use crate::{
    errors::{AppError, AppResult},
    web::{
        AppState,
        extractors::{StagedUpload, UploadForm},
        responses::BatchResponse,
    },
};

const BATCH_PREFIX: &str = "batch";
const BATCH_ARCHIVE_PREFIX: &str = "batch-compressed";
const DEFAULT_OPERATION: &str = "compress";

/// Name inside the archive for the `index`th upload, unique within `taken`.
fn entry_name(upload: &StagedUpload, index: usize, taken: &mut HashSet<String>) -> String {
    let base = upload
        .base_name()
        .unwrap_or_else(|| format!("document-{index}"));

    let mut name = format!("{base}-compressed.pdf");
    if !taken.insert(name.clone()) {
        name = format!("{base}-compressed-{index}.pdf");
        taken.insert(name.clone());
    }
    name
}

/// `POST /api/pdf/batch`
pub async fn batch_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<BatchResponse>> {
    let form = UploadForm::collect(&state.workspace, &mut multipart).await?;

    let operation = form.text("operation").unwrap_or(DEFAULT_OPERATION);
    if operation != DEFAULT_OPERATION {
        return Err(AppError::validation(format!(
            "Unsupported batch operation '{operation}'"
        )));
    }

    let file_count = form
        .parse::<usize>("fileCount")?
        .unwrap_or(form.uploads.len());
    if file_count == 0 || form.uploads.is_empty() {
        return Err(AppError::validation("No files provided"));
    }

    let scratch = state.workspace.new_scratch_directory(BATCH_PREFIX).await?;
    let selected = &form.uploads[..file_count.min(form.uploads.len())];

    let outcome = match compress_into(&state, selected, &scratch).await {
        Ok((0, failed)) => Err(AppError::compression(format!(
            "none of the {failed} files could be processed"
        ))),
        Ok(counts) => state
            .workspace
            .bundle(&scratch, BATCH_ARCHIVE_PREFIX)
            .await
            .map(|archive| (archive, counts))
            .map_err(AppError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = state.workspace.discard_scratch(&scratch).await {
        warn!("Failed to remove batch directory {:?}: {}", scratch, e);
    }

    let (archive, (processed, failed)) = outcome?;
    let file_name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::internal("Batch archive has no file name"))?;

    info!(
        "Batch produced {} ({} processed, {} failed)",
        file_name, processed, failed
    );

    Ok(Json(BatchResponse {
        download_url: state.config.web.download_url(file_name),
        processed,
        failed,
    }))
}

/// Optimize every upload into `scratch`. Returns `(processed, failed)`.
async fn compress_into(
    state: &AppState,
    uploads: &[StagedUpload],
    scratch: &Path,
) -> AppResult<(usize, usize)> {
    let mut taken = HashSet::new();
    let mut processed = 0;
    let mut failed = 0;

    for (index, upload) in uploads.iter().enumerate() {
        let output = scratch.join(entry_name(upload, index, &mut taken));
        match state.engine.optimize(&upload.path, &output).await {
            Ok(()) => processed += 1,
            Err(e) => {
                warn!(
                    "Skipping {:?} in batch: {}",
                    upload.original_name.as_deref().unwrap_or(&upload.field),
                    e
                );
                failed += 1;
                // Partial output must not end up in the archive
                if let Err(e) = tokio::fs::remove_file(&output).await
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    return Err(AppError::Workspace(e.into()));
                }
            }
        }
    }

    Ok((processed, failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn upload(name: Option<&str>) -> StagedUpload {
        StagedUpload {
            field: "file0".to_string(),
            index: Some(0),
            original_name: name.map(str::to_string),
            path: PathBuf::from("/tmp/in.pdf"),
        }
    }

    #[test]
    fn test_entry_names_are_unique() {
        let mut taken = HashSet::new();
        assert_eq!(entry_name(&upload(Some("report.pdf")), 0, &mut taken), "report-compressed.pdf");
        assert_eq!(
            entry_name(&upload(Some("other/report.pdf")), 1, &mut taken),
            "report-compressed-1.pdf"
        );
        assert_eq!(entry_name(&upload(None), 2, &mut taken), "document-2-compressed.pdf");
    }
}
