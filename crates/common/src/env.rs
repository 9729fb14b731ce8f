//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the directory holding the local draft cache exists.
///
/// An empty path means the cache lives in memory only; that is allowed but
/// drafts will not survive a restart, so it is reported.
pub async fn ensure_env(cache_path: &str) -> anyhow::Result<()> {
    if cache_path.trim().is_empty() {
        warn!("cache.path is empty; local drafts are kept in memory only");
        return Ok(());
    }
    if let Some(parent) = Path::new(cache_path).parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
        info!(dir = %parent.display(), "local cache directory ready");
    }
    Ok(())
}
