//! Process-wide bookkeeping of every artifact the workspace must reclaim.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{fs, sync::RwLock, time::Instant};

/// A tracked artifact.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    /// Monotonic capture used for expiry decisions
    pub created_at: Instant,
    /// Wall-clock capture used for reporting
    pub registered_at: DateTime<Utc>,
}

impl ArtifactEntry {
    fn new(path: PathBuf, created_at: Instant) -> Self {
        let age = Instant::now().saturating_duration_since(created_at);
        let registered_at =
            Utc::now() - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            path,
            created_at,
            registered_at,
        }
    }

    /// Time elapsed since registration.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }
}

/// Statistics about tracked artifacts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub tracked_artifacts: usize,
    pub oldest_age_secs: Option<u64>,
}

/// Map of artifact path to creation time, guarded by a single reader/writer lock.
///
/// Cloning is cheap and every clone shares the same map.
#[derive(Clone, Debug, Default)]
pub struct ArtifactRegistry {
    entries: Arc<RwLock<HashMap<PathBuf, ArtifactEntry>>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `path` as of now.
    ///
    /// Returns `false` if the path was already tracked; the original timestamp is kept.
    pub async fn register<P: Into<PathBuf>>(&self, path: P) -> bool {
        self.register_at(path.into(), Instant::now()).await
    }

    /// Track `path` as if it had been registered `age` ago.
    ///
    /// Used when adopting files that survived a restart.
    pub async fn register_with_age<P: Into<PathBuf>>(&self, path: P, age: Duration) -> bool {
        let now = Instant::now();
        let created_at = now.checked_sub(age).unwrap_or(now);
        self.register_at(path.into(), created_at).await
    }

    async fn register_at(&self, path: PathBuf, created_at: Instant) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&path) {
            tracing::debug!("Artifact already registered, keeping original timestamp: {:?}", path);
            return false;
        }
        tracing::trace!("Registered artifact: {:?}", path);
        entries.insert(path.clone(), ArtifactEntry::new(path, created_at));
        true
    }

    /// Stop tracking `path` without touching the filesystem.
    pub async fn forget(&self, path: &Path) -> bool {
        self.entries.write().await.remove(path).is_some()
    }

    pub async fn contains(&self, path: &Path) -> bool {
        self.entries.read().await.contains_key(path)
    }

    pub async fn get(&self, path: &Path) -> Option<ArtifactEntry> {
        self.entries.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> RegistryStats {
        let entries = self.entries.read().await;
        let oldest_age_secs = entries.values().map(|e| e.age().as_secs()).max();
        RegistryStats {
            tracked_artifacts: entries.len(),
            oldest_age_secs,
        }
    }

    /// Evict every entry older than `ttl`, deleting its file from disk.
    ///
    /// Deletion is best effort: a failure is logged and the entry is dropped anyway,
    /// so a stuck file never wedges later sweeps. Returns the number of evicted entries.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let expired: Vec<PathBuf> = entries
            .values()
            .filter(|entry| now.saturating_duration_since(entry.created_at) > ttl)
            .map(|entry| entry.path.clone())
            .collect();

        for path in &expired {
            match fs::remove_file(path).await {
                Ok(()) => tracing::debug!("Removed expired artifact: {:?}", path),
                // Reserved but never written, or already discarded
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::trace!("Expired artifact already absent: {:?}", path);
                }
                Err(e) => tracing::warn!("Failed to remove expired artifact {:?}: {}", path, e),
            }
            entries.remove(path);
        }

        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_keeps_first_timestamp() {
        let registry = ArtifactRegistry::new();
        let path = PathBuf::from("/tmp/does-not-matter.pdf");

        assert!(registry.register(&path).await);
        let first = registry.get(&path).await.map(|e| e.created_at);

        assert!(!registry.register(&path).await);
        let second = registry.get(&path).await.map(|e| e.created_at);

        assert_eq!(first, second);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_respects_ttl_boundary() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let ttl = Duration::from_secs(600);
        let registry = ArtifactRegistry::new();
        registry.register(&path).await;

        tokio::time::advance(ttl - Duration::from_millis(1)).await;
        assert_eq!(registry.sweep_expired(ttl).await, 0);
        assert!(registry.contains(&path).await);
        assert!(path.exists());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(registry.sweep_expired(ttl).await, 1);
        assert!(!registry.contains(&path).await);
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_is_idempotent() {
        let registry = ArtifactRegistry::new();
        registry.register("/nonexistent/a.pdf").await;
        registry.register("/nonexistent/b.pdf").await;

        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(registry.sweep_expired(Duration::from_secs(60)).await, 2);
        assert_eq!(registry.sweep_expired(Duration::from_secs(60)).await, 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_is_still_evicted() {
        let registry = ArtifactRegistry::new();
        let reserved = PathBuf::from("/nonexistent/reserved-but-never-written.pdf");
        registry.register(&reserved).await;

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(registry.sweep_expired(Duration::from_secs(1)).await, 1);
        assert!(!registry.contains(&reserved).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undeletable_entry_is_still_evicted() {
        let temp_dir = tempfile::tempdir().unwrap();
        // remove_file on a non-empty directory fails with something other than NotFound
        let stuck = temp_dir.path().join("stuck");
        std::fs::create_dir(&stuck).unwrap();
        std::fs::write(stuck.join("inner.pdf"), b"%PDF").unwrap();

        let registry = ArtifactRegistry::new();
        registry.register(&stuck).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(registry.sweep_expired(Duration::from_secs(1)).await, 1);
        assert!(!registry.contains(&stuck).await);
        assert!(stuck.exists());
        assert_eq!(registry.sweep_expired(Duration::from_secs(1)).await, 0);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = RegistryStats {
            tracked_artifacts: 2,
            oldest_age_secs: Some(30),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["trackedArtifacts"], 2);
        assert_eq!(json["oldestAgeSecs"], 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_with_age_backdates_entry() {
        tokio::time::advance(Duration::from_secs(10)).await;

        let registry = ArtifactRegistry::new();
        registry
            .register_with_age("/nonexistent/leftover.pdf", Duration::from_secs(5))
            .await;
        registry.register("/nonexistent/fresh.pdf").await;

        assert_eq!(registry.sweep_expired(Duration::from_secs(3)).await, 1);
        assert!(registry.contains(Path::new("/nonexistent/fresh.pdf")).await);

        let stats = registry.stats().await;
        assert_eq!(stats.tracked_artifacts, 1);
    }

    #[tokio::test]
    async fn test_forget_leaves_file_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("keep.bin");
        std::fs::write(&path, b"data").unwrap();

        let registry = ArtifactRegistry::new();
        registry.register(&path).await;
        assert!(registry.forget(&path).await);
        assert!(!registry.forget(&path).await);
        assert!(path.exists());
    }
}
