//! One draft session (coordinator + timer) per `(table, owner)` pair.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use service::autosave::{
    load_envelope, storage_key, AutoSaveConfig, AutoSaveTimer, Backends, FormBinding, PersistenceCoordinator,
    StorageEnvelope,
};
use service::storage::LocalCache;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub table: String,
    pub owner_id: Option<String>,
}

pub struct DraftSession {
    pub coordinator: Arc<PersistenceCoordinator>,
    // dropping the timer stops the ticks
    _timer: AutoSaveTimer,
}

impl DraftKey {
    fn owner_label(&self) -> &str { self.owner_id.as_deref().unwrap_or("anonymous") }
}

/// Holds the process-wide backends and the live sessions.
///
/// Only writes open a session (and its timer); reads go through an existing
/// session or straight to the local cache, and a discard drops the session.
pub struct DraftRegistry {
    backends: Backends,
    config: AutoSaveConfig,
    sessions: DashMap<DraftKey, Arc<DraftSession>>,
}

impl DraftRegistry {
    pub fn new(backends: Backends, config: AutoSaveConfig) -> Self {
        Self { backends, config, sessions: DashMap::new() }
    }

    /// Existing session for the key, or a new one bound to `record_id`.
    /// The record id only matters when the session is first created.
    pub fn get_or_create(&self, key: DraftKey, record_id: Option<String>) -> Arc<DraftSession> {
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| {
                let binding = FormBinding { table: key.table.clone(), owner_id: key.owner_id.clone(), record_id };
                let coordinator = PersistenceCoordinator::new(self.backends.clone(), self.config.clone(), binding);
                let timer = AutoSaveTimer::spawn(&coordinator);
                info!(
                    table = %key.table,
                    owner_id = key.owner_label(),
                    event = "draft_session_opened",
                    "draft session opened"
                );
                Arc::new(DraftSession { coordinator, _timer: timer })
            })
            .value()
            .clone()
    }

    pub fn get(&self, key: &DraftKey) -> Option<Arc<DraftSession>> {
        self.sessions.get(key).map(|s| s.value().clone())
    }

    pub fn storage_key(&self, key: &DraftKey) -> String {
        storage_key(&self.config.key_prefix, &key.table, key.owner_id.as_deref())
    }

    /// Saved envelope for the key, read through the live session when there
    /// is one and from the cache otherwise. Never opens a session.
    pub async fn load(&self, key: &DraftKey) -> Option<StorageEnvelope> {
        match self.get(key) {
            Some(session) => session.coordinator.load_saved_data().await,
            None => load_envelope(self.backends.cache.as_ref(), &self.storage_key(key)).await,
        }
    }

    /// Close the session (stopping its timer) and delete the cached draft.
    pub async fn discard(&self, key: &DraftKey) {
        match self.sessions.remove(key) {
            Some((_, session)) => session.coordinator.clear_saved_data().await,
            None => {
                let cache_key = self.storage_key(key);
                if let Err(e) = self.backends.cache.remove(&cache_key).await {
                    warn!(key = %cache_key, error = %e, "failed to remove local draft");
                }
            }
        }
        info!(table = %key.table, owner_id = key.owner_label(), event = "draft_session_closed", "draft session closed");
    }

    pub fn len(&self) -> usize { self.sessions.len() }

    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
}
