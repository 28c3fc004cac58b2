//! Backend catalog: cached snapshots of discovered backends.
//!
//! Snapshots are keyed by `(owner, provider)`. An owner without any
//! snapshot for a provider is reported as [`SchedError::NotFound`]; an owner
//! whose snapshot simply has no backend in the requested routing group gets
//! an empty list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::fs;
use tokio::sync::RwLock;

use qdispatch_hal::BackendRecord;

use crate::error::{SchedError, SchedResult};

/// Read access to discovered backends, plus snapshot replacement for the
/// refresh path.
#[async_trait]
pub trait BackendCatalog: Send + Sync {
    /// Every record `owner` has for `provider`, in discovery order.
    async fn list_all(&self, owner: &str, provider: &str) -> SchedResult<Vec<BackendRecord>>;

    /// Replace the snapshot `owner` has for `provider`.
    async fn store(
        &self,
        owner: &str,
        provider: &str,
        records: Vec<BackendRecord>,
    ) -> SchedResult<()>;

    /// Records of one routing group. No side effects.
    async fn list(
        &self,
        owner: &str,
        provider: &str,
        routing_group: &str,
    ) -> SchedResult<Vec<BackendRecord>> {
        let mut records = self.list_all(owner, provider).await?;
        records.retain(|r| r.routing_group == routing_group);
        Ok(records)
    }
}

fn owner_not_found(owner: &str, provider: &str) -> SchedError {
    SchedError::NotFound(format!(
        "no {provider} backends recorded for owner '{owner}'"
    ))
}

/// Catalog held in memory. Suitable for tests and short-lived processes.
#[derive(Default)]
pub struct InMemoryCatalog {
    snapshots: RwLock<FxHashMap<(String, String), Vec<BackendRecord>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog seeded with one snapshot.
    pub fn with_records(
        owner: impl Into<String>,
        provider: impl Into<String>,
        records: Vec<BackendRecord>,
    ) -> Self {
        let mut snapshots = FxHashMap::default();
        snapshots.insert((owner.into(), provider.into()), records);
        Self {
            snapshots: RwLock::new(snapshots),
        }
    }
}

#[async_trait]
impl BackendCatalog for InMemoryCatalog {
    async fn list_all(&self, owner: &str, provider: &str) -> SchedResult<Vec<BackendRecord>> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(&(owner.to_string(), provider.to_string()))
            .cloned()
            .ok_or_else(|| owner_not_found(owner, provider))
    }

    async fn store(
        &self,
        owner: &str,
        provider: &str,
        records: Vec<BackendRecord>,
    ) -> SchedResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert((owner.to_string(), provider.to_string()), records);
        Ok(())
    }
}

/// JSON file-based catalog.
///
/// Stores each snapshot as `<base_dir>/<owner>/<provider>.json`. Snapshots
/// are cached after the first read.
pub struct JsonCatalog {
    /// Base directory for storage.
    base_dir: PathBuf,

    /// In-memory cache of snapshots.
    cache: RwLock<FxHashMap<(String, String), Vec<BackendRecord>>>,
}

impl JsonCatalog {
    /// Create a catalog rooted at `base_dir`, creating the directory.
    pub async fn new(base_dir: impl AsRef<Path>) -> SchedResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;

        Ok(Self {
            base_dir,
            cache: RwLock::new(FxHashMap::default()),
        })
    }

    fn snapshot_path(&self, owner: &str, provider: &str) -> SchedResult<PathBuf> {
        for part in [owner, provider] {
            if part.is_empty() || part.contains(['/', '\\']) || part.starts_with('.') {
                return Err(SchedError::Persistence(format!(
                    "invalid catalog key component '{part}'"
                )));
            }
        }
        Ok(self.base_dir.join(owner).join(format!("{provider}.json")))
    }
}

#[async_trait]
impl BackendCatalog for JsonCatalog {
    async fn list_all(&self, owner: &str, provider: &str) -> SchedResult<Vec<BackendRecord>> {
        let key = (owner.to_string(), provider.to_string());

        // Check cache first
        let cache = self.cache.read().await;
        if let Some(records) = cache.get(&key) {
            return Ok(records.clone());
        }
        drop(cache);

        // Load from file
        let path = self.snapshot_path(owner, provider)?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let records: Vec<BackendRecord> = serde_json::from_str(&content)?;
                let mut cache = self.cache.write().await;
                cache.insert(key, records.clone());
                Ok(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(owner_not_found(owner, provider))
            }
            Err(e) => Err(SchedError::Io(e)),
        }
    }

    async fn store(
        &self,
        owner: &str,
        provider: &str,
        records: Vec<BackendRecord>,
    ) -> SchedResult<()> {
        let path = self.snapshot_path(owner, provider)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(&path, json).await?;

        let mut cache = self.cache.write().await;
        cache.insert((owner.to_string(), provider.to_string()), records);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdispatch_hal::BackendKind;

    fn sample() -> Vec<BackendRecord> {
        vec![
            BackendRecord::new("simA", 5, BackendKind::Simulator)
                .with_routing_group("g1")
                .with_owner("alice"),
            BackendRecord::new("qpuB", 27, BackendKind::Physical)
                .with_routing_group("g2")
                .with_owner("alice"),
        ]
    }

    #[tokio::test]
    async fn test_in_memory_list_filters_routing_group() {
        let catalog = InMemoryCatalog::with_records("alice", "ibmq", sample());

        let g1 = catalog.list("alice", "ibmq", "g1").await.unwrap();
        assert_eq!(g1.len(), 1);
        assert_eq!(g1[0].name, "simA");

        let g3 = catalog.list("alice", "ibmq", "g3").await.unwrap();
        assert!(g3.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_unknown_owner_is_not_found() {
        let catalog = InMemoryCatalog::with_records("alice", "ibmq", sample());
        let result = catalog.list("bob", "ibmq", "g1").await;
        assert!(matches!(result, Err(SchedError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_json_catalog_roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let catalog = JsonCatalog::new(dir.path()).await.unwrap();
        catalog.store("alice", "ibmq", sample()).await.unwrap();
        assert!(dir.path().join("alice").join("ibmq.json").exists());

        // Fresh instance reads from disk rather than the cache.
        let reopened = JsonCatalog::new(dir.path()).await.unwrap();
        let records = reopened.list("alice", "ibmq", "g2").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qubit_count, 27);
    }

    #[tokio::test]
    async fn test_json_catalog_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = JsonCatalog::new(dir.path()).await.unwrap();
        assert!(matches!(
            catalog.list_all("alice", "ibmq").await,
            Err(SchedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_json_catalog_rejects_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = JsonCatalog::new(dir.path()).await.unwrap();
        let result = catalog.store("../etc", "ibmq", Vec::new()).await;
        assert!(matches!(result, Err(SchedError::Persistence(_))));
    }
}
