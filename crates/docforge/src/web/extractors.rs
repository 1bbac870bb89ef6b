//! Multipart form collection.
//!
//! File fields (`file`, `file0`, `file1`, ...) are streamed straight into the
//! workspace as they arrive; every other field is read as text.

use axum::extract::Multipart;
use ephemeral_workspace::{Workspace, WorkspaceError};
use futures::TryStreamExt;
use std::{collections::HashMap, path::{Path, PathBuf}, str::FromStr};
use tokio_util::io::StreamReader;

use crate::errors::{AppError, AppResult};

/// An uploaded file already staged and registered in the workspace
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub field: String,
    /// Numeric suffix of `fileN` fields
    pub index: Option<usize>,
    /// File name the client supplied, if any
    pub original_name: Option<String>,
    pub path: PathBuf,
}

impl StagedUpload {
    /// Client file name without directories or extension.
    pub fn base_name(&self) -> Option<String> {
        self.original_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .filter(|stem| !stem.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub uploads: Vec<StagedUpload>,
    pub fields: HashMap<String, String>,
}

/// `Some(None)` for `file`, `Some(Some(n))` for `fileN`, `None` otherwise.
fn upload_index(name: &str) -> Option<Option<usize>> {
    let suffix = name.strip_prefix("file")?;
    if suffix.is_empty() {
        return Some(None);
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        return suffix.parse().ok().map(Some);
    }
    None
}

/// The client's body stream broke off or was malformed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ClientStreamError(String);

/// Broken client streams are the client's fault; disk failures are ours.
fn staging_error(error: WorkspaceError) -> AppError {
    match error {
        WorkspaceError::Io(e)
            if e.get_ref().is_some_and(|inner| inner.is::<ClientStreamError>()) =>
        {
            AppError::validation(format!("Failed to read file: {e}"))
        }
        other => AppError::Workspace(other),
    }
}

impl UploadForm {
    /// Drain `multipart`, staging file fields into `workspace`.
    pub async fn collect(workspace: &Workspace, multipart: &mut Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            match upload_index(&name) {
                Some(index) => {
                    let original_name = field.file_name().map(str::to_string);
                    let reader = StreamReader::new(
                        field.map_err(|e| std::io::Error::other(ClientStreamError(e.to_string()))),
                    );
                    tokio::pin!(reader);

                    let path = workspace
                        .stage_upload(&mut reader, original_name.as_deref())
                        .await
                        .map_err(staging_error)?;

                    tracing::debug!("Staged field {} ({:?}) at {:?}", name, original_name, path);
                    form.uploads.push(StagedUpload {
                        field: name,
                        index,
                        original_name,
                        path,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::validation(format!("Invalid field '{name}': {e}")))?;
                    form.fields.insert(name, value);
                }
            }
        }

        form.uploads.sort_by_key(|upload| upload.index);
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Parse an optional text field, rejecting values that do not parse.
    pub fn parse<T: FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        self.text(name)
            .map(|raw| {
                raw.parse()
                    .map_err(|_| AppError::validation(format!("Invalid {name} '{raw}'")))
            })
            .transpose()
    }

    /// `file0`, else `file`, else whatever file came first.
    pub fn primary_upload(&self) -> Option<&StagedUpload> {
        self.uploads
            .iter()
            .find(|u| u.index == Some(0))
            .or_else(|| self.uploads.iter().find(|u| u.index.is_none()))
            .or_else(|| self.uploads.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_index() {
        assert_eq!(upload_index("file"), Some(None));
        assert_eq!(upload_index("file0"), Some(Some(0)));
        assert_eq!(upload_index("file12"), Some(Some(12)));
        assert_eq!(upload_index("fileCount"), None);
        assert_eq!(upload_index("targetSize"), None);
    }

    #[test]
    fn test_base_name_strips_directories() {
        let upload = StagedUpload {
            field: "file0".to_string(),
            index: Some(0),
            original_name: Some("reports/Q3 summary.pdf".to_string()),
            path: PathBuf::from("/tmp/x.pdf"),
        };
        assert_eq!(upload.base_name().as_deref(), Some("Q3 summary"));
    }

    #[test]
    fn test_staging_errors_split_client_and_server_faults() {
        use axum::{http::StatusCode, response::IntoResponse};

        let client = staging_error(WorkspaceError::Io(std::io::Error::other(ClientStreamError(
            "stream ended early".to_string(),
        ))));
        assert!(matches!(client, AppError::Validation { .. }));
        assert_eq!(client.into_response().status(), StatusCode::BAD_REQUEST);

        let disk = staging_error(WorkspaceError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "uploads directory is read-only",
        )));
        assert!(matches!(disk, AppError::Workspace(WorkspaceError::Io(_))));
        assert_eq!(disk.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let mut form = UploadForm::default();
        form.fields.insert("targetSize".to_string(), "abc".to_string());
        form.fields.insert("fileCount".to_string(), " 3 ".to_string());

        assert!(form.parse::<i64>("targetSize").is_err());
        assert_eq!(form.parse::<usize>("fileCount").ok().flatten(), Some(3));
        assert_eq!(form.parse::<i64>("missing").ok().flatten(), None);
    }
}
