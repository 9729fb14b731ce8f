//! Runtime environment helpers
//!
//! Builds the process-wide persistence backends from configuration and
//! keeps binary crates importing `service::runtime` without depending
//! directly on `common`.

use std::sync::Arc;

use tracing::{info, warn};

use configs::AppConfig;

use crate::autosave::{Backends, StorageMode};
use crate::notify::TracingNotifier;
use crate::remote::{RecordStore, RestRecordStore};
use crate::storage::{JsonFileCache, LocalCache, MemoryCache};

/// Ensure the cache directory exists; warn when drafts are memory-only.
pub async fn ensure_env(cache_path: &str) -> anyhow::Result<()> {
    common::env::ensure_env(cache_path).await
}

/// Construct the cache, record store and notifier once for the whole process.
pub async fn build_backends(cfg: &AppConfig) -> anyhow::Result<Backends> {
    let quota = (cfg.cache.quota_bytes > 0).then_some(cfg.cache.quota_bytes);
    let cache: Arc<dyn LocalCache> = if cfg.cache.path.trim().is_empty() {
        Arc::new(match quota {
            Some(q) => MemoryCache::with_quota(q),
            None => MemoryCache::new(),
        })
    } else {
        JsonFileCache::open(&cfg.cache.path, quota).await?
    };

    let remote: Option<Arc<dyn RecordStore>> = if cfg.remote.is_configured() {
        info!(url = %cfg.remote.url, "remote record store configured");
        Some(Arc::new(RestRecordStore::from_config(&cfg.remote)?))
    } else {
        if cfg.autosave.storage == StorageMode::Remote {
            warn!("autosave.storage = remote but remote.url is empty; drafts stay local");
        }
        None
    };

    Ok(Backends { cache, remote, notifier: Arc::new(TracingNotifier) })
}
