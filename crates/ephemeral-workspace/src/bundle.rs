//! Packaging a directory of outputs into a single zip archive.

use crate::error::{Result, WorkspaceError};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Bundle every top-level regular file in `source_dir` into a deflate zip at `archive_path`.
///
/// Subdirectories are skipped. Entry names are the files' base names, in sorted order.
/// A partially written archive is left in place on failure. Returns the entry count.
pub async fn bundle_directory(source_dir: &Path, archive_path: &Path) -> Result<usize> {
    let source_dir = source_dir.to_path_buf();
    let archive_path = archive_path.to_path_buf();
    let task_source = source_dir.clone();

    tokio::task::spawn_blocking(move || write_archive(&task_source, &archive_path))
        .await
        .map_err(|e| WorkspaceError::bundling(&source_dir, format!("bundling task failed: {e}")))?
}

fn list_top_level_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let read_failed =
        |e: std::io::Error| WorkspaceError::bundling(source_dir, format!("cannot read directory: {e}"));

    let mut files = Vec::new();
    for entry in std::fs::read_dir(source_dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        if entry.file_type().map_err(read_failed)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn write_archive(source_dir: &Path, archive_path: &Path) -> Result<usize> {
    let files = list_top_level_files(source_dir)?;

    let archive = File::create(archive_path).map_err(|e| {
        WorkspaceError::bundling(
            source_dir,
            format!("cannot create archive {}: {e}", archive_path.display()),
        )
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(archive));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in &files {
        let entry_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| WorkspaceError::bundling(source_dir, "entry has no file name"))?;

        writer
            .start_file(entry_name.clone(), options)
            .map_err(|e| WorkspaceError::bundling(source_dir, format!("{entry_name}: {e}")))?;

        let mut source = File::open(path)
            .map_err(|e| WorkspaceError::bundling(source_dir, format!("{entry_name}: {e}")))?;
        std::io::copy(&mut source, &mut writer)
            .map_err(|e| WorkspaceError::bundling(source_dir, format!("{entry_name}: {e}")))?;
    }

    writer
        .finish()
        .map_err(|e| WorkspaceError::bundling(source_dir, format!("cannot finalize archive: {e}")))?
        .flush()
        .map_err(|e| WorkspaceError::bundling(source_dir, format!("cannot flush archive: {e}")))?;

    tracing::debug!(
        "Bundled {} files from {:?} into {:?}",
        files.len(),
        source_dir,
        archive_path
    );
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn test_bundle_skips_subdirectories() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp_dir = tempfile::tempdir()?;
        let source = temp_dir.path().join("pages");
        std::fs::create_dir_all(source.join("nested"))?;
        std::fs::write(source.join("page-2.png"), b"second")?;
        std::fs::write(source.join("page-1.png"), b"first")?;
        std::fs::write(source.join("nested").join("hidden.png"), b"skip me")?;

        let archive_path = temp_dir.path().join("pages.zip");
        let count = bundle_directory(&source, &archive_path).await?;
        assert_eq!(count, 2);

        let mut archive = zip::ZipArchive::new(File::open(&archive_path)?)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png"]);

        let mut contents = String::new();
        archive.by_name("page-1.png")?.read_to_string(&mut contents)?;
        assert_eq!(contents, "first");
        Ok(())
    }

    #[tokio::test]
    async fn test_bundle_empty_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp_dir = tempfile::tempdir()?;
        let source = temp_dir.path().join("empty");
        std::fs::create_dir(&source)?;

        let archive_path = temp_dir.path().join("empty.zip");
        assert_eq!(bundle_directory(&source, &archive_path).await?, 0);

        let archive = zip::ZipArchive::new(File::open(&archive_path)?)?;
        assert_eq!(archive.len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_directory_is_bundling_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = bundle_directory(
            &temp_dir.path().join("does-not-exist"),
            &temp_dir.path().join("out.zip"),
        )
        .await;

        assert!(matches!(result, Err(WorkspaceError::Bundling { .. })));
    }

    #[tokio::test]
    async fn test_uncreatable_archive_is_bundling_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("pages");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("page-1.png"), b"first").unwrap();

        let result = bundle_directory(&source, &temp_dir.path().join("missing").join("out.zip")).await;

        match result {
            Err(WorkspaceError::Bundling { reason, .. }) => {
                assert!(reason.contains("cannot create archive"), "{reason}");
            }
            other => panic!("expected bundling failure, got {other:?}"),
        }
    }
}
