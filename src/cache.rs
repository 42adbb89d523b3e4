//! Persistent module cache
//!
//! Maps the literal request path of a module to its load result. Two tiers:
//! - a bounded in-memory tier (`moka`) for hot entries
//! - a durable disk tier, one JSON file per key, named by the key's `blake3` hash
//!
//! Entries never expire and are never invalidated. A cached module is trusted
//! forever once written, so a changed upstream file is only seen after the
//! cache directory is cleared by hand.

use crate::loader::{LoadResult, LoaderKind};
use crate::CacheError;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Serialized form of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Literal request path, not normalized
    pub key: String,
    pub loader: LoaderKind,
    pub contents: String,
    pub resolve_dir: Option<String>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, result: &LoadResult) -> Self {
        Self {
            key: key.into(),
            loader: result.loader,
            contents: result.contents.clone(),
            resolve_dir: result.resolve_dir.clone(),
        }
    }

    fn into_result(self) -> LoadResult {
        LoadResult {
            loader: self.loader,
            contents: self.contents,
            resolve_dir: self.resolve_dir,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Approximate number of entries in the memory tier
    pub memory_entries: u64,
}

/// Module cache shared by every bundle run
#[derive(Debug)]
pub struct ModuleCache {
    memory: Cache<String, Arc<LoadResult>>,
    /// `None` keeps the cache in memory only
    directory: Option<PathBuf>,
    initialized: OnceCell<()>,
}

impl ModuleCache {
    /// Open a cache persisted under `directory`. The directory is created on first write.
    pub fn open(directory: impl Into<PathBuf>, memory_capacity: u64) -> Self {
        Self {
            memory: Cache::new(memory_capacity),
            directory: Some(directory.into()),
            initialized: OnceCell::new(),
        }
    }

    /// Create a cache that does not survive the process
    pub fn in_memory(memory_capacity: u64) -> Self {
        Self {
            memory: Cache::new(memory_capacity),
            directory: None,
            initialized: OnceCell::new(),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Look up a module. Never touches the network.
    pub async fn get(&self, key: &str) -> Option<Arc<LoadResult>> {
        if let Some(hit) = self.memory.get(key).await {
            debug!(key, "module cache hit (memory)");
            return Some(hit);
        }

        let path = self.entry_path(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "unreadable module cache entry");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "corrupt module cache entry");
                return None;
            }
        };

        if entry.key != key {
            warn!(key, stored = %entry.key, "module cache entry belongs to another key");
            return None;
        }

        debug!(key, "module cache hit (disk)");
        let result = Arc::new(entry.into_result());
        self.memory.insert(key.to_string(), Arc::clone(&result)).await;
        Some(result)
    }

    /// Store a module, overwriting any previous entry for the key
    pub async fn set(&self, key: &str, result: Arc<LoadResult>) -> Result<(), CacheError> {
        self.memory.insert(key.to_string(), Arc::clone(&result)).await;

        let Some(path) = self.entry_path(key) else {
            return Ok(());
        };
        self.ensure_directory().await?;

        let entry = CacheEntry::new(key, &result);
        let json = serde_json::to_vec(&entry).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;

        // Write then rename so a concurrent reader never sees half an entry
        let staging = path.with_extension(format!("{}.tmp", ulid::Ulid::new()));
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| CacheError::io_error(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| CacheError::io_error(&path, e))?;

        debug!(key, path = %path.display(), "module cached");
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory.entry_count(),
        }
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let directory = self.directory.as_ref()?;
        let hash = blake3::hash(key.as_bytes());
        Some(directory.join(format!("{}.json", hash.to_hex())))
    }

    async fn ensure_directory(&self) -> Result<(), CacheError> {
        let Some(directory) = &self.directory else {
            return Ok(());
        };
        self.initialized
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(directory)
                    .await
                    .map_err(|e| CacheError::io_error(directory, e))
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Arc<LoadResult> {
        Arc::new(LoadResult {
            loader: LoaderKind::Jsx,
            contents: "module.exports = 1;".to_string(),
            resolve_dir: Some("https://unpkg.com/tiny@1.0.0/".to_string()),
        })
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = ModuleCache::in_memory(16);
        assert!(cache.get("https://unpkg.com/tiny").await.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = ModuleCache::in_memory(16);
        cache.set("https://unpkg.com/tiny", sample()).await.unwrap();

        let hit = cache.get("https://unpkg.com/tiny").await.unwrap();
        assert_eq!(*hit, *sample());
    }

    #[tokio::test]
    async fn test_keys_are_not_normalized() {
        let cache = ModuleCache::in_memory(16);
        cache.set("https://unpkg.com/tiny", sample()).await.unwrap();
        assert!(cache.get("https://unpkg.com/tiny/").await.is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = ModuleCache::in_memory(16);
        cache.set("k", sample()).await.unwrap();

        let newer = Arc::new(LoadResult {
            loader: LoaderKind::Jsx,
            contents: "module.exports = 2;".to_string(),
            resolve_dir: None,
        });
        cache.set("k", Arc::clone(&newer)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().contents, "module.exports = 2;");
    }

    #[tokio::test]
    async fn test_directory_created_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("file-cache");
        let cache = ModuleCache::open(&directory, 16);

        assert!(cache.get("k").await.is_none());
        assert!(!directory.exists());

        cache.set("k", sample()).await.unwrap();
        assert!(directory.exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("file-cache");

        {
            let cache = ModuleCache::open(&directory, 16);
            cache.set("https://unpkg.com/tiny", sample()).await.unwrap();
        }

        let reopened = ModuleCache::open(&directory, 16);
        let hit = reopened.get("https://unpkg.com/tiny").await.unwrap();
        assert_eq!(*hit, *sample());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModuleCache::open(temp_dir.path(), 16);
        let path = cache.entry_path("k").unwrap();
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(cache.get("k").await.is_none());
    }
}
