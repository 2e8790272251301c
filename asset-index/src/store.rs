//! Asset record storage.
//!
//! The reconciler talks to storage only through [`AssetStore`]. Every method
//! touches a single record and is atomic for that record; nothing here locks
//! across ids.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::Result;
use crate::pattern::AssetPath;

/// An indexed theme asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Unique key, `<namespace>/<path>`.
    #[serde(rename = "_id")]
    pub id: String,

    /// Canonical asset path.
    pub path: AssetPath,

    /// Whether downstream consumers must re-derive output for this asset.
    #[serde(default)]
    pub modified: bool,
}

impl AssetRecord {
    /// Create a record.
    pub fn new(id: impl Into<String>, path: AssetPath, modified: bool) -> Self {
        Self {
            id: id.into(),
            path,
            modified,
        }
    }
}

/// Keyed persistence for asset records.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Look up a record by id.
    async fn find(&self, id: &str) -> Result<Option<AssetRecord>>;

    /// Insert a record, replacing any record with the same id.
    async fn insert(&self, record: AssetRecord) -> Result<()>;

    /// Set the `modified` flag of an existing record.
    ///
    /// Returns `false` without writing when no record has this id.
    async fn update_modified(&self, id: &str, modified: bool) -> Result<bool>;

    /// Remove a record by id. Returns whether a record was removed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// All records, in no particular order.
    async fn list(&self) -> Result<Vec<AssetRecord>>;

    /// Write out mutations the store has buffered. No-op by default.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store described by the configuration.
///
/// Uses a JSON file when `store_path` is set, memory otherwise.
pub async fn open_store(config: &IndexConfig) -> Result<Arc<dyn AssetStore>> {
    match &config.store_path {
        Some(path) => {
            let store = JsonAssetStore::open(path).await?;
            if config.deferred_writes {
                Ok(Arc::new(store.with_deferred_writes()))
            } else {
                Ok(Arc::new(store))
            }
        }
        None => Ok(Arc::new(MemoryAssetStore::new())),
    }
}

/// In-memory asset store.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    records: RwLock<HashMap<String, AssetRecord>>,
}

impl MemoryAssetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = AssetRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect(),
            ),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn find(&self, id: &str) -> Result<Option<AssetRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn insert(&self, record: AssetRecord) -> Result<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_modified(&self, id: &str, modified: bool) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                record.modified = modified;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<AssetRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// Asset store persisted as a JSON array of records.
///
/// The whole file is rewritten through a temporary file and a rename while
/// the write lock is held, so mutations of different ids are serialized.
/// By default that happens after every mutation, which costs a full rewrite
/// per event. With [`JsonAssetStore::with_deferred_writes`] mutations only
/// touch memory until [`AssetStore::flush`], which
/// [`Reconciler::dispatch_batch`](crate::Reconciler::dispatch_batch) calls
/// once per batch.
pub struct JsonAssetStore {
    path: PathBuf,
    records: RwLock<HashMap<String, AssetRecord>>,
    deferred: bool,
    dirty: AtomicBool,
}

impl JsonAssetStore {
    /// Open a store, loading existing records if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let records: Vec<AssetRecord> = serde_json::from_str(&content)?;
            info!(
                "Loaded {} asset records from {}",
                records.len(),
                path.display()
            );
            records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
            deferred: false,
            dirty: AtomicBool::new(false),
        })
    }

    /// Buffer mutations in memory until [`AssetStore::flush`].
    pub fn with_deferred_writes(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Check if there are mutations not yet written to disk.
    pub fn has_pending_writes(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_through(&self, records: &HashMap<String, AssetRecord>) -> Result<()> {
        if self.deferred {
            self.dirty.store(true, Ordering::Release);
            return Ok(());
        }
        self.persist(records).await
    }

    async fn persist(&self, records: &HashMap<String, AssetRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut sorted: Vec<&AssetRecord> = records.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        let content = serde_json::to_string_pretty(&sorted)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            "Persisted {} asset records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl AssetStore for JsonAssetStore {
    async fn find(&self, id: &str) -> Result<Option<AssetRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn insert(&self, record: AssetRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let previous = records.insert(record.id.clone(), record.clone());
        if let Err(e) = self.write_through(&records).await {
            // Keep memory in step with the file.
            match previous {
                Some(previous) => records.insert(record.id, previous),
                None => records.remove(&record.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn update_modified(&self, id: &str, modified: bool) -> Result<bool> {
        let mut records = self.records.write().await;
        let previous = match records.get_mut(id) {
            Some(record) => std::mem::replace(&mut record.modified, modified),
            None => return Ok(false),
        };

        if let Err(e) = self.write_through(&records).await {
            if let Some(record) = records.get_mut(id) {
                record.modified = previous;
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let Some(previous) = records.remove(id) else {
            return Ok(false);
        };

        if let Err(e) = self.write_through(&records).await {
            records.insert(previous.id.clone(), previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<AssetRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn flush(&self) -> Result<()> {
        // Mutations need the write lock, so none can land mid-flush.
        let records = self.records.read().await;
        if self.dirty.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.persist(&records).await {
                self.dirty.store(true, Ordering::Release);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(path: &str, modified: bool) -> AssetRecord {
        AssetRecord::new(
            format!("themes/test/{path}"),
            AssetPath::parse(path).unwrap(),
            modified,
        )
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryAssetStore::new();
        let rec = record("style.css", false);

        store.insert(rec.clone()).await.unwrap();
        assert_eq!(store.find(&rec.id).await.unwrap(), Some(rec.clone()));

        assert!(store.update_modified(&rec.id, true).await.unwrap());
        assert!(store.find(&rec.id).await.unwrap().unwrap().modified);

        assert!(store.remove(&rec.id).await.unwrap());
        assert!(!store.remove(&rec.id).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_update_missing() {
        let store = MemoryAssetStore::new();
        assert!(!store.update_modified("themes/test/a.css", true).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_json_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index").join("assets.json");

        {
            let store = JsonAssetStore::open(&path).await.unwrap();
            store.insert(record("a.css", false)).await.unwrap();
            store.insert(record("b.js", true)).await.unwrap();
            store.remove(&record("b.js", true).id).await.unwrap();
        }

        let reopened = JsonAssetStore::open(&path).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records, vec![record("a.css", false)]);
    }

    #[tokio::test]
    async fn test_json_store_record_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("assets.json");

        let store = JsonAssetStore::open(&path).await.unwrap();
        store.insert(record("img/logo.png", true)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "_id": "themes/test/img/logo.png",
                "path": "img/logo.png",
                "modified": true
            }])
        );
    }

    #[tokio::test]
    async fn test_json_store_deferred_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("assets.json");

        let store = JsonAssetStore::open(&path)
            .await
            .unwrap()
            .with_deferred_writes();
        for name in ["a.css", "b.js", "c.png"] {
            store.insert(record(name, true)).await.unwrap();
        }
        assert!(store.update_modified(&record("a.css", true).id, false).await.unwrap());

        assert!(!path.exists());
        assert!(store.has_pending_writes());

        store.flush().await.unwrap();
        assert!(!store.has_pending_writes());

        let reopened = JsonAssetStore::open(&path).await.unwrap();
        let mut records = reopened.list().await.unwrap();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(
            records,
            vec![
                record("a.css", false),
                record("b.js", true),
                record("c.png", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_without_changes_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("assets.json");

        let store = JsonAssetStore::open(&path)
            .await
            .unwrap()
            .with_deferred_writes();
        store.remove("themes/test/missing.css").await.unwrap();
        store.flush().await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_store_defaults_to_memory() {
        let store = open_store(&IndexConfig::new("themes/test")).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
