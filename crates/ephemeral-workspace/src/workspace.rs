//! The on-disk working area: staged uploads, reserved outputs and scratch directories.

use crate::{
    bundle::bundle_directory,
    error::{Result, WorkspaceError},
    policy::RetentionPolicy,
    registry::ArtifactRegistry,
    security::{
        normalize_extension, sanitize_extension, sanitize_prefix, set_secure_permissions,
        validate_file_name, validate_path_within_sandbox,
    },
    sweeper::RetentionSweeper,
};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tokio::{
    fs,
    io::{AsyncRead, AsyncWriteExt},
};
use uuid::Uuid;

/// Subdirectory holding staged uploads.
pub const UPLOADS_DIR: &str = "uploads";
/// Subdirectory holding generated outputs and scratch directories.
pub const OUTPUT_DIR: &str = "output";
/// Extension applied to uploads whose name carries none we trust.
pub const DEFAULT_UPLOAD_EXTENSION: &str = ".pdf";

const TOKEN_LEN: usize = 8;

fn short_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Sandboxed working directory whose artifacts are tracked for reclamation.
///
/// Cloning shares the underlying registry.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
    uploads_dir: PathBuf,
    output_dir: PathBuf,
    registry: ArtifactRegistry,
    policy: RetentionPolicy,
}

impl Workspace {
    /// Create a new builder for configuring the workspace.
    pub fn builder() -> WorkspaceBuilder {
        WorkspaceBuilder::new()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// A sweeper bound to this workspace's registry and policy. Call `spawn` to start it.
    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.registry.clone(), self.policy)
    }

    /// Copy `reader` into a freshly named file under `uploads/` and register it.
    ///
    /// The file is registered before any bytes are copied. If the copy fails the
    /// partial file is removed and the entry forgotten.
    ///
    /// # Errors
    /// Returns `WorkspaceError::Io` if the file cannot be created or the stream
    /// cannot be read or written.
    pub async fn stage_upload<R>(&self, reader: &mut R, filename_hint: Option<&str>) -> Result<PathBuf>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let extension = sanitize_extension(filename_hint, DEFAULT_UPLOAD_EXTENSION);
        let path = self
            .uploads_dir
            .join(format!("{}{}", Uuid::new_v4(), extension));

        let mut file = fs::File::create(&path).await?;
        self.registry.register(&path).await;

        let copied = async {
            let bytes = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match copied {
            Ok(bytes) => {
                tracing::debug!("Staged upload {:?} ({} bytes)", path, bytes);
                Ok(path)
            }
            Err(e) => {
                drop(file);
                tracing::warn!("Upload staging failed for {:?}: {}", path, e);
                if let Err(remove_err) = fs::remove_file(&path).await
                    && remove_err.kind() != ErrorKind::NotFound
                {
                    tracing::warn!("Failed to remove partial upload {:?}: {}", path, remove_err);
                }
                self.registry.forget(&path).await;
                Err(e.into())
            }
        }
    }

    /// Reserve and register a unique output path `output/<prefix>-<token><extension>`.
    ///
    /// The file is not created. Callers write to the returned path.
    pub async fn reserve_output_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let prefix = sanitize_prefix(prefix);
        let extension = normalize_extension(extension);

        loop {
            let path = self
                .output_dir
                .join(format!("{prefix}-{}{extension}", short_token()));
            if self.registry.register(&path).await {
                return path;
            }
        }
    }

    /// Create an unregistered scratch directory `output/<prefix>-<token>/`.
    ///
    /// The caller must hand it back to `discard_scratch` when done.
    ///
    /// # Errors
    /// Returns `WorkspaceError::DirectoryCreation` if the directory cannot be created.
    pub async fn new_scratch_directory(&self, prefix: &str) -> Result<PathBuf> {
        let prefix = sanitize_prefix(prefix);

        loop {
            let dir = self.output_dir.join(format!("{prefix}-{}", short_token()));
            match fs::create_dir(&dir).await {
                Ok(()) => {
                    tracing::trace!("Created scratch directory {:?}", dir);
                    return Ok(dir);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(source) => {
                    return Err(WorkspaceError::DirectoryCreation { path: dir, source });
                }
            }
        }
    }

    /// Recursively remove a scratch directory. One that is already gone is fine.
    ///
    /// # Errors
    /// Returns `WorkspaceError::PathValidation` for anything outside `output/`.
    pub async fn discard_scratch(&self, dir: &Path) -> Result<()> {
        validate_path_within_sandbox(dir, &self.output_dir)?;

        match fs::remove_dir_all(dir).await {
            Ok(()) => {
                tracing::trace!("Discarded scratch directory {:?}", dir);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a tracked artifact ahead of its TTL and drop its registry entry.
    ///
    /// # Errors
    /// Returns `WorkspaceError::PathValidation` for paths outside the workspace,
    /// or `WorkspaceError::Io` if the file exists but cannot be removed.
    pub async fn discard_artifact(&self, path: &Path) -> Result<()> {
        validate_path_within_sandbox(path, &self.root)?;

        match fs::remove_file(path).await {
            Ok(()) => tracing::trace!("Discarded artifact {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.registry.forget(path).await;
        Ok(())
    }

    /// Map a bare download name to its location under `output/`.
    ///
    /// # Errors
    /// Returns `WorkspaceError::PathValidation` if the name is not a plain file name.
    pub fn resolve_output(&self, file_name: &str) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.output_dir.join(file_name))
    }

    /// Reserve a `.zip` output and bundle the top-level files of `source_dir` into it.
    ///
    /// # Errors
    /// Returns `WorkspaceError::Bundling` if the directory cannot be read or the
    /// archive cannot be written. The reserved archive path stays registered.
    pub async fn bundle(&self, source_dir: &Path, prefix: &str) -> Result<PathBuf> {
        let archive = self.reserve_output_path(prefix, ".zip").await;
        let entries = bundle_directory(source_dir, &archive).await?;
        tracing::debug!("Bundled {} entries into {:?}", entries, archive);
        Ok(archive)
    }

    /// Register files left behind by a previous run, back-dated by their mtime age.
    ///
    /// Leftover scratch directories are removed outright.
    async fn adopt_existing(&self) -> Result<usize> {
        let mut adopted = 0;
        let mut scratch_removed = 0;

        for dir in [&self.uploads_dir, &self.output_dir] {
            let mut entries = fs::read_dir(dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_file() {
                    let age = entry
                        .metadata()
                        .await?
                        .modified()
                        .ok()
                        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
                        .unwrap_or_default();
                    if self.registry.register_with_age(&path, age).await {
                        adopted += 1;
                    }
                } else if file_type.is_dir() && dir == &self.output_dir {
                    match fs::remove_dir_all(&path).await {
                        Ok(()) => scratch_removed += 1,
                        Err(e) => {
                            tracing::warn!("Failed to remove leftover scratch directory {:?}: {}", path, e);
                        }
                    }
                }
            }
        }

        if adopted > 0 {
            tracing::info!("Adopted {} existing artifacts from disk", adopted);
        }
        if scratch_removed > 0 {
            tracing::info!("Removed {} leftover scratch directories", scratch_removed);
        }

        Ok(adopted)
    }
}

/// Builder for configuring a `Workspace`.
#[derive(Debug)]
pub struct WorkspaceBuilder {
    root: Option<PathBuf>,
    policy: RetentionPolicy,
    registry: Option<ArtifactRegistry>,
    adopt_existing: bool,
}

impl WorkspaceBuilder {
    fn new() -> Self {
        Self {
            root: None,
            policy: RetentionPolicy::default(),
            registry: None,
            adopt_existing: true,
        }
    }

    /// Set the workspace root directory.
    #[must_use]
    pub fn root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Set the retention policy.
    #[must_use]
    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share an existing registry instead of creating a fresh one.
    #[must_use]
    pub fn registry(mut self, registry: ArtifactRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Whether files already on disk are registered at build time (default `true`).
    #[must_use]
    pub fn adopt_existing(mut self, adopt: bool) -> Self {
        self.adopt_existing = adopt;
        self
    }

    /// Build the `Workspace`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The root is not set or the retention is zero
    /// - The root or its subdirectories cannot be created or secured
    /// - Adopting existing files fails
    pub async fn build(self) -> Result<Workspace> {
        let root = self.root.ok_or_else(|| WorkspaceError::Configuration {
            message: "Workspace root is required".to_string(),
        })?;

        if self.policy.retention.is_zero() {
            return Err(WorkspaceError::Configuration {
                message: "Retention must be greater than zero".to_string(),
            });
        }
        if self.policy.sweep_interval.is_some_and(|i| i.is_zero()) {
            return Err(WorkspaceError::Configuration {
                message: "Sweep interval must be greater than zero".to_string(),
            });
        }

        for dir in [root.clone(), root.join(UPLOADS_DIR), root.join(OUTPUT_DIR)] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| WorkspaceError::DirectoryCreation {
                    path: dir.clone(),
                    source,
                })?;
        }

        set_secure_permissions(&root).await?;

        let root = fs::canonicalize(&root).await?;
        let workspace = Workspace {
            uploads_dir: root.join(UPLOADS_DIR),
            output_dir: root.join(OUTPUT_DIR),
            root,
            registry: self.registry.unwrap_or_default(),
            policy: self.policy,
        };

        if self.adopt_existing {
            workspace.adopt_existing().await?;
        }

        tracing::info!(
            "Workspace initialized - root: {:?}, retention: {:?}, sweep_interval: {:?}",
            workspace.root,
            workspace.policy.retention,
            workspace.policy.effective_sweep_interval()
        );

        Ok(workspace)
    }
}
