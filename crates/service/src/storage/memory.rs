use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::PersistenceError;
use crate::storage::{usage_with, LocalCache};

/// In-process cache; drafts do not survive a restart.
#[derive(Default)]
pub struct MemoryCache {
    inner: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self { Self::default() }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { inner: RwLock::default(), quota_bytes: Some(quota_bytes) }
    }

    /// Write a raw value, bypassing the quota. Handy for seeding tests.
    pub async fn put_raw(&self, key: &str, value: &str) {
        self.inner.write().await.insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.inner.read().await.get(key).cloned())
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
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.write().await.remove(key);
        Ok(())
    }
}
