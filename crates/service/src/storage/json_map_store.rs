use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};

use crate::errors::PersistenceError;
use crate::storage::{usage_with, LocalCache};

/// JSON file-backed local cache.
///
/// Keeps a `HashMap<String, String>` in memory and rewrites the whole file
/// after every mutation. Intended for draft-sized payloads where a database
/// is overkill.
#[derive(Clone)]
pub struct JsonFileCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
    file_path: PathBuf,
    quota_bytes: Option<usize>,
}

impl JsonFileCache {
    /// Open the cache at `path`, creating an empty file if missing.
    /// A file that does not parse is treated as empty.
    pub async fn open<P: Into<PathBuf>>(path: P, quota_bytes: Option<usize>) -> Result<Arc<Self>, PersistenceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let map: HashMap<String, String> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "cache file unreadable; starting empty");
                HashMap::new()
            }),
            Err(_) => {
                let empty: HashMap<String, String> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(PersistenceError::local)?)
                    .await
                    .map_err(PersistenceError::local)?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: Arc::new(RwLock::new(map)), file_path, quota_bytes }))
    }

    async fn flush(&self, map: &HashMap<String, String>) -> Result<(), PersistenceError> {
        let data = serde_json::to_vec(map).map_err(PersistenceError::local)?;
        fs::write(&self.file_path, data).await.map_err(PersistenceError::local)?;
        Ok(())
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl LocalCache for JsonFileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().await;
        if let Some(quota) = self.quota_bytes {
            let needed = usage_with(map.iter(), key, &value);
            if needed > quota {
                return Err(PersistenceError::LocalStorage(format!(
                    "quota exceeded: {needed} bytes needed, {quota} allowed"
                )));
            }
        }
        let previous = map.insert(key.to_string(), value);
        // hold the write lock across the flush so file order matches map order
        if let Err(e) = self.flush(&map).await {
            match previous {
                Some(old) => map.insert(key.to_string(), old),
                None => map.remove(key),
            };
            return Err(e);
        }
        debug!(key, "cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().await;
        if map.remove(key).is_some() {
            self.flush(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("json_file_cache_{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn json_file_cache_crud_persists() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let cache = JsonFileCache::open(&tmp, None).await?;

        // initially empty
        assert!(cache.is_empty().await);

        cache.set("a", "1".into()).await?;
        cache.set("b", "2".into()).await?;
        assert_eq!(cache.get("a").await?.as_deref(), Some("1"));

        // overwrite
        cache.set("a", "10".into()).await?;
        assert_eq!(cache.get("a").await?.as_deref(), Some("10"));

        // remove and reload persistence
        cache.remove("b").await?;
        let reloaded = JsonFileCache::open(&tmp, None).await?;
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(reloaded.get("a").await?.as_deref(), Some("10"));
        assert_eq!(reloaded.get("b").await?, None);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        tokio::fs::write(&tmp, b"{not json").await?;
        let cache = JsonFileCache::open(&tmp, None).await?;
        assert!(cache.is_empty().await);
        cache.set("k", "v".into()).await?;
        let reloaded = JsonFileCache::open(&tmp, None).await?;
        assert_eq!(reloaded.get("k").await?.as_deref(), Some("v"));
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn quota_rejects_oversized_write() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let cache = JsonFileCache::open(&tmp, Some(16)).await?;
        cache.set("k", "small".into()).await?;

        let err = cache.set("k2", "x".repeat(32)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::LocalStorage(_)));
        assert_eq!(cache.get("k2").await?, None);

        // replacing an existing value only counts the new value
        cache.set("k", "0123456789".into()).await?;
        assert_eq!(cache.get("k").await?.as_deref(), Some("0123456789"));
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
