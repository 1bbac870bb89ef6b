//! Security utilities for name sanitization and sandbox validation.

use crate::error::{Result, WorkspaceError};
use std::path::Path;

const FALLBACK_PREFIX: &str = "artifact";
const MAX_EXTENSION_LEN: usize = 10;
const MAX_PREFIX_LEN: usize = 64;

/// Sets secure permissions on a directory (Unix only).
pub async fn set_secure_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(path, perms)
            .await
            .map_err(|_e| WorkspaceError::Permission {
                operation: "set secure permissions".to_string(),
                path: path.to_path_buf(),
            })?;
    }

    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(WorkspaceError::path_validation(path, "Directory does not exist"));
        }
    }

    Ok(())
}

/// Derive a trusted extension (with leading dot) from an uploaded filename.
///
/// Only 1-10 ASCII alphanumerics are trusted; anything else falls back to `default`.
pub fn sanitize_extension(filename_hint: Option<&str>, default: &str) -> String {
    let candidate = filename_hint
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match candidate {
        Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
        None => normalize_extension(default),
    }
}

/// Ensure an extension carries exactly one leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{trimmed}")
    }
}

/// Reduce a human-readable prefix to `[A-Za-z0-9_-]`.
pub fn sanitize_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_PREFIX_LEN)
        .collect();

    if cleaned.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        cleaned
    }
}

/// Validate a bare file name supplied by a client (e.g. a download request).
pub fn validate_file_name(name: &str) -> Result<()> {
    let path = Path::new(name);

    if name.is_empty() {
        return Err(WorkspaceError::path_validation(path, "File name cannot be empty"));
    }
    if name.contains('\0') {
        return Err(WorkspaceError::path_validation(path, "File name contains null bytes"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(WorkspaceError::path_validation(path, "File name contains path separators"));
    }
    if name == "." || name == ".." {
        return Err(WorkspaceError::path_validation(path, "File name is a directory reference"));
    }

    Ok(())
}

/// Validates that a path is within the specified sandbox directory.
/// Uses OS path resolution to handle symlinks, .., ., etc. properly.
pub fn validate_path_within_sandbox(path: &Path, sandbox_base: &Path) -> Result<()> {
    let canonical_base = sandbox_base.canonicalize().map_err(|e| {
        WorkspaceError::path_validation(sandbox_base, format!("Failed to resolve sandbox base: {e}"))
    })?;

    let canonical_path = if path.exists() {
        path.canonicalize()
            .map_err(|e| WorkspaceError::path_validation(path, format!("Failed to resolve path: {e}")))?
    } else {
        // Path doesn't exist - resolve parent and append filename
        let parent = path
            .parent()
            .ok_or_else(|| WorkspaceError::path_validation(path, "Path has no parent directory"))?;
        let canonical_parent = parent.canonicalize().map_err(|e| {
            WorkspaceError::path_validation(parent, format!("Failed to resolve parent: {e}"))
        })?;
        let filename = path
            .file_name()
            .ok_or_else(|| WorkspaceError::path_validation(path, "Invalid filename"))?;
        canonical_parent.join(filename)
    };

    if canonical_path == canonical_base || !canonical_path.starts_with(&canonical_base) {
        return Err(WorkspaceError::path_validation(
            path,
            format!(
                "Path escapes sandbox: resolves to '{}' (outside '{}')",
                canonical_path.display(),
                canonical_base.display()
            ),
        ));
    }

    Ok(())
}
