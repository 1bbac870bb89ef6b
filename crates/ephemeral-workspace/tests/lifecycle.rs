use ephemeral_workspace::{ArtifactRegistry, RetentionPolicy, Workspace};
use std::{collections::HashSet, io::Read, path::PathBuf, time::Duration};
use tempfile::TempDir;

async fn workspace_with(temp_dir: &TempDir, policy: RetentionPolicy) -> Workspace {
    Workspace::builder()
        .root(temp_dir.path().join("work"))
        .retention(policy)
        .build()
        .await
        .unwrap()
}

/// Every reserved output path is distinct
#[tokio::test]
async fn test_reserved_paths_are_unique() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with(&temp_dir, RetentionPolicy::default()).await;

    let mut seen = HashSet::new();
    for _ in 0..500 {
        let path = workspace.reserve_output_path("compressed", ".pdf").await;
        assert!(seen.insert(path), "reserve_output_path returned a duplicate");
    }
    assert_eq!(workspace.registry().len().await, 500);
}

/// Staged uploads and reserved outputs are tracked before the call returns
#[tokio::test]
async fn test_registration_completeness() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with(&temp_dir, RetentionPolicy::default()).await;

    let mut body: &[u8] = b"%PDF-1.4 upload body";
    let staged = workspace
        .stage_upload(&mut body, Some("input.pdf"))
        .await
        .unwrap();
    assert!(workspace.registry().contains(&staged).await);
    assert!(staged.is_absolute());

    let reserved = workspace.reserve_output_path("merged", "pdf").await;
    assert!(workspace.registry().contains(&reserved).await);
    assert!(reserved.is_absolute());
    assert!(!reserved.exists(), "reservation must not create the file");
}

/// Concurrent registrations of distinct paths are never lost
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_safety() {
    let registry = ArtifactRegistry::new();

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.register(format!("/nonexistent/artifact-{i}.pdf")).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap());
    }

    assert_eq!(registry.len().await, 64);
    for i in 0..64 {
        let path = PathBuf::from(format!("/nonexistent/artifact-{i}.pdf"));
        assert!(registry.contains(&path).await);
    }
}

/// Concurrent reservations through the workspace stay unique
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_are_unique() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with(&temp_dir, RetentionPolicy::default()).await;

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let workspace = workspace.clone();
            tokio::spawn(async move { workspace.reserve_output_path("page", ".png").await })
        })
        .collect();

    let mut paths = HashSet::new();
    for task in tasks {
        paths.insert(task.await.unwrap());
    }
    assert_eq!(paths.len(), 32);
    assert_eq!(workspace.registry().len().await, 32);
}

/// A bundle holds exactly the source files, byte for byte
#[tokio::test]
async fn test_bundling_completeness() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with(&temp_dir, RetentionPolicy::default()).await;

    let scratch = workspace.new_scratch_directory("split").await.unwrap();
    let sources = [
        ("a.pdf", b"%PDF-1.7 first page".to_vec()),
        ("b.pdf", b"%PDF-1.7 second page".repeat(64)),
        ("c.pdf", (0..=255u8).cycle().take(4096).collect::<Vec<u8>>()),
    ];
    for (name, contents) in &sources {
        std::fs::write(scratch.join(name), contents).unwrap();
    }

    let archive_path = workspace.bundle(&scratch, "split").await.unwrap();
    workspace.discard_scratch(&scratch).await.unwrap();

    assert!(workspace.registry().contains(&archive_path).await);
    assert_eq!(archive_path.extension().and_then(|e| e.to_str()), Some("zip"));
    assert!(!scratch.exists());

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 3);

    for (index, (name, contents)) in sources.iter().enumerate() {
        let mut entry = archive.by_index(index).unwrap();
        assert_eq!(entry.name(), *name);
        assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);

        let mut extracted = Vec::new();
        entry.read_to_end(&mut extracted).unwrap();
        assert_eq!(&extracted, contents);
    }
}

/// The background sweeper reclaims uploads, written outputs and empty reservations
#[tokio::test]
async fn test_sweeper_reclaims_workspace_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let policy = RetentionPolicy::new()
        .remove_after(Duration::from_millis(100))
        .sweep_every(Duration::from_millis(25));
    let workspace = workspace_with(&temp_dir, policy).await;
    let sweeper = workspace.sweeper().spawn();

    let mut body: &[u8] = b"%PDF-1.7";
    let staged = workspace.stage_upload(&mut body, None).await.unwrap();
    let written = workspace.reserve_output_path("compressed", ".pdf").await;
    std::fs::write(&written, b"%PDF-1.7 smaller").unwrap();
    let never_written = workspace.reserve_output_path("crashed", ".pdf").await;

    // Still inside the TTL
    assert_eq!(workspace.registry().len().await, 3);
    assert!(staged.exists());

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(workspace.registry().is_empty().await);
    assert!(!staged.exists());
    assert!(!written.exists());
    assert!(!never_written.exists());

    sweeper.shutdown().await;
}

/// Files from a previous run are adopted with their age and swept on schedule
#[tokio::test]
async fn test_restart_adoption_sweeps_stale_files() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("work");
    std::fs::create_dir_all(root.join("output")).unwrap();
    let stale = root.join("output").join("compressed-0badf00d.pdf");
    std::fs::write(&stale, b"left over").unwrap();

    // Let the leftover age past the TTL before the workspace comes up
    tokio::time::sleep(Duration::from_millis(150)).await;

    let workspace = Workspace::builder()
        .root(&root)
        .retention(RetentionPolicy::new().remove_after(Duration::from_millis(100)))
        .build()
        .await
        .unwrap();

    let fresh = workspace.reserve_output_path("fresh", ".pdf").await;
    let evicted = workspace
        .registry()
        .sweep_expired(workspace.policy().retention)
        .await;

    assert_eq!(evicted, 1);
    assert!(!workspace.output_dir().join("compressed-0badf00d.pdf").exists());
    assert!(workspace.registry().contains(&fresh).await);
}
