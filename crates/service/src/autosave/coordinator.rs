use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::autosave::config::{storage_key, AutoSaveConfig, StorageMode};
use crate::autosave::format::format_last_saved;
use crate::autosave::state::{FormSnapshot, SaveState, StorageEnvelope};
use crate::errors::PersistenceError;
use crate::notify::{Notice, Notifier};
use crate::observability;
use crate::remote::{record_id, Record, RecordStore, ID_COLUMN, OWNER_COLUMN};
use crate::storage::LocalCache;

/// Process-wide collaborators, constructed once by the application entry
/// point and handed to every coordinator.
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn LocalCache>,
    pub remote: Option<Arc<dyn RecordStore>>,
    pub notifier: Arc<dyn Notifier>,
}

/// Which logical form (and whose row) a coordinator persists.
#[derive(Debug, Clone, Default)]
pub struct FormBinding {
    pub table: String,
    pub owner_id: Option<String>,
    pub record_id: Option<String>,
}

impl FormBinding {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), ..Self::default() }
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Local,
    Remote,
}

impl Sink {
    fn as_str(&self) -> &'static str {
        match self {
            Sink::Local => "local",
            Sink::Remote => "remote",
        }
    }
}

/// Result of one save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Auto-save disabled or nothing changed; no store was touched.
    Skipped,
    Saved(Sink),
    Failed,
}

struct Tracked {
    value: FormSnapshot,
    revision: u64,
}

/// Owns one form's snapshot and decides when and where it is persisted.
///
/// The remote store is preferred when `storage = remote` and an owner is
/// bound; the local cache is the unconditional fallback. Failures never
/// escape: callers only see a [`SaveOutcome`] or a `bool`.
pub struct PersistenceCoordinator {
    config: AutoSaveConfig,
    table: String,
    owner_id: Option<String>,
    key: String,
    record_id: Mutex<Option<String>>,
    snapshot: Mutex<Tracked>,
    state: watch::Sender<SaveState>,
    // serializes save attempts so a manual save and a timer tick never
    // write the same remote row concurrently
    save_lock: Mutex<()>,
    backends: Backends,
}

impl PersistenceCoordinator {
    pub fn new(backends: Backends, config: AutoSaveConfig, binding: FormBinding) -> Arc<Self> {
        let key = storage_key(&config.key_prefix, &binding.table, binding.owner_id.as_deref());
        let (state, _) = watch::channel(SaveState::default());
        Arc::new(Self {
            config,
            table: binding.table,
            owner_id: binding.owner_id,
            key,
            record_id: Mutex::new(binding.record_id),
            snapshot: Mutex::new(Tracked { value: FormSnapshot::new(), revision: 0 }),
            state,
            save_lock: Mutex::new(()),
            backends,
        })
    }

    pub fn config(&self) -> &AutoSaveConfig { &self.config }

    pub fn table(&self) -> &str { &self.table }

    pub fn owner_id(&self) -> Option<&str> { self.owner_id.as_deref() }

    /// Local cache key for this form.
    pub fn storage_key(&self) -> &str { &self.key }

    pub async fn record_id(&self) -> Option<String> { self.record_id.lock().await.clone() }

    pub fn state(&self) -> SaveState { self.state.borrow().clone() }

    fn is_dirty(&self) -> bool { self.state.borrow().has_unsaved_changes }

    /// Observe every state transition (`is_saving`, `last_saved`, ...).
    pub fn subscribe(&self) -> watch::Receiver<SaveState> { self.state.subscribe() }

    /// Replace the bound snapshot. Always marks the form dirty, even when the
    /// new value equals the old one.
    pub async fn set_snapshot(&self, snapshot: FormSnapshot) {
        let mut tracked = self.snapshot.lock().await;
        tracked.value = snapshot;
        tracked.revision += 1;
        self.state.send_modify(|s| s.has_unsaved_changes = true);
    }

    /// Human-readable age of the last successful save.
    pub fn last_saved_label(&self) -> Option<String> {
        format_last_saved(self.state.borrow().last_saved, Utc::now())
    }

    /// Timer entry point. Does nothing unless enabled and dirty; tries the
    /// remote store first when it applies and falls back to the local cache.
    #[instrument(skip(self), fields(table = %self.table, key = %self.key))]
    pub async fn auto_save(&self) -> SaveOutcome {
        if !self.config.enabled || !self.is_dirty() {
            return SaveOutcome::Skipped;
        }
        let _guard = self.save_lock.lock().await;
        // a save that held the lock may already have flushed our changes
        if !self.is_dirty() {
            return SaveOutcome::Skipped;
        }
        let outcome = self.save_with_fallback().await;
        debug!(?outcome, "auto-save finished");
        outcome
    }

    /// Manual save. Ignores the `enabled` flag and the dirty flag; emits a
    /// confirmation notice when anything was stored.
    #[instrument(skip(self), fields(table = %self.table, key = %self.key))]
    pub async fn save_now(&self) -> bool {
        let _guard = self.save_lock.lock().await;
        match self.save_with_fallback().await {
            SaveOutcome::Saved(sink) => {
                let description = match sink {
                    Sink::Remote => "Your progress was saved to your account.",
                    Sink::Local => "Your progress was saved on this device.",
                };
                self.backends.notifier.notify(Notice::info("Progress saved", description));
                true
            }
            _ => false,
        }
    }

    /// Read back the locally cached envelope. Missing, unreadable and
    /// malformed entries all read as `None`.
    pub async fn load_saved_data(&self) -> Option<StorageEnvelope> {
        load_envelope(self.backends.cache.as_ref(), &self.key).await
    }

    /// Forget the local draft and reset the save state. Waits for an
    /// in-flight save so its local fallback cannot resurrect the entry.
    pub async fn clear_saved_data(&self) {
        let _guard = self.save_lock.lock().await;
        if let Err(e) = self.backends.cache.remove(&self.key).await {
            warn!(key = %self.key, error = %e, "failed to remove local draft");
        }
        self.state.send_replace(SaveState::default());
        info!(key = %self.key, event = "draft_cleared", "local draft cleared");
    }

    fn remote_target(&self) -> Option<(&Arc<dyn RecordStore>, &str)> {
        if self.config.storage != StorageMode::Remote {
            return None;
        }
        match (self.backends.remote.as_ref(), self.owner_id.as_deref()) {
            (Some(remote), Some(owner)) => Some((remote, owner)),
            (None, Some(_)) => {
                debug!("remote storage requested but no record store configured");
                None
            }
            _ => None,
        }
    }

    /// One attempt: `Idle -> Saving -> {Saved, Failed}`. Caller holds the save lock.
    async fn save_with_fallback(&self) -> SaveOutcome {
        let (data, revision) = {
            let tracked = self.snapshot.lock().await;
            (tracked.value.clone(), tracked.revision)
        };
        self.state.send_modify(|s| s.is_saving = true);

        let mut saved = None;
        if let Some((remote, owner)) = self.remote_target() {
            match self.save_remote(remote.as_ref(), owner, &data).await {
                Ok(()) => saved = Some(Sink::Remote),
                Err(e) => {
                    observability::SAVE_FAILURES_TOTAL.with_label_values(&[Sink::Remote.as_str()]).inc();
                    warn!(owner_id = %owner, error = %e, "remote save failed; falling back to local cache");
                    self.backends.notifier.notify(Notice::warning(
                        "Could not save to your account",
                        "Your data is still saved locally. We will try again shortly.",
                    ));
                }
            }
        }
        if saved.is_none() {
            match self.save_local(&data).await {
                Ok(()) => saved = Some(Sink::Local),
                Err(e) => {
                    observability::SAVE_FAILURES_TOTAL.with_label_values(&[Sink::Local.as_str()]).inc();
                    warn!(error = %e, "local save failed");
                }
            }
        }

        let now = Utc::now();
        let current_revision = self.snapshot.lock().await.revision;
        self.state.send_modify(|s| {
            s.is_saving = false;
            if saved.is_some() {
                s.last_saved = Some(now);
                // edits made while the save was in flight stay dirty
                if current_revision == revision {
                    s.has_unsaved_changes = false;
                }
            }
        });

        match saved {
            Some(sink) => {
                observability::SAVES_TOTAL.with_label_values(&[sink.as_str()]).inc();
                SaveOutcome::Saved(sink)
            }
            None => SaveOutcome::Failed,
        }
    }

    async fn save_local(&self, data: &FormSnapshot) -> Result<(), PersistenceError> {
        let envelope = StorageEnvelope::new(data.clone(), Utc::now(), self.owner_id.clone());
        let raw = serde_json::to_string(&envelope).map_err(PersistenceError::local)?;
        self.backends.cache.set(&self.key, raw).await?;
        debug!(key = %self.key, "draft saved to local cache");
        Ok(())
    }

    /// Update the bound row (scoped by id and owner) or insert a new one and
    /// bind its id for later saves.
    async fn save_remote(&self, remote: &dyn RecordStore, owner: &str, data: &FormSnapshot) -> Result<(), PersistenceError> {
        let now = timestamp(Utc::now());
        let mut row: Record = data.clone();
        // the store owns the primary key; a form field named `id` must not
        // retarget the PATCH filter or pick the inserted row's key
        row.remove(ID_COLUMN);
        row.insert(OWNER_COLUMN.into(), Value::String(owner.to_string()));
        row.insert("updated_at".into(), Value::String(now.clone()));

        let mut bound = self.record_id.lock().await;
        match bound.as_deref() {
            Some(id) => {
                remote.update(&self.table, id, owner, row).await?;
                debug!(record_id = %id, "remote draft updated");
            }
            None => {
                row.insert("created_at".into(), Value::String(now));
                let stored = remote.insert(&self.table, row).await?;
                *bound = record_id(&stored);
                debug!(record_id = ?bound.as_deref(), "remote draft inserted");
            }
        }
        Ok(())
    }
}

async fn read_envelope(cache: &dyn LocalCache, key: &str) -> Result<Option<StorageEnvelope>, PersistenceError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str::<StorageEnvelope>(&raw)
        .map(Some)
        .map_err(|e| PersistenceError::MalformedCacheEntry { key: key.to_string(), reason: e.to_string() })
}

/// Read the envelope stored under `key` without a coordinator. Missing,
/// unreadable and malformed entries all read as `None`.
pub async fn load_envelope(cache: &dyn LocalCache, key: &str) -> Option<StorageEnvelope> {
    match read_envelope(cache, key).await {
        Ok(found) => found,
        Err(e @ PersistenceError::MalformedCacheEntry { .. }) => {
            debug!(error = %e, "ignoring malformed cache entry");
            None
        }
        Err(e) => {
            warn!(key = %key, error = %e, "failed to read local draft");
            None
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
