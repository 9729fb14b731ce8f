//! Form auto-save: keeps a form snapshot durably saved within one interval
//! of its last change.
//!
//! - [`PersistenceCoordinator`] owns the snapshot and the save state.
//! - [`AutoSaveTimer`] fires `auto_save` on a fixed interval.
//! - [`format_last_saved`] renders the "saved N min ago" label.

pub mod config;
pub mod coordinator;
pub mod format;
pub mod state;
pub mod timer;

pub use config::{storage_key, AutoSaveConfig, StorageMode};
pub use coordinator::{load_envelope, Backends, FormBinding, PersistenceCoordinator, SaveOutcome, Sink};
pub use format::format_last_saved;
pub use state::{FormSnapshot, SaveState, StorageEnvelope};
pub use timer::AutoSaveTimer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::storage::{LocalCache, MemoryCache};
    use crate::test_support::{snapshot, RecordingNotifier};

    // enabled local config, 5s interval, prefix "f", table "intake", no owner
    #[tokio::test(start_paused = true)]
    async fn anonymous_intake_form_lands_in_cache_after_one_tick() -> anyhow::Result<()> {
        let cache = Arc::new(MemoryCache::new());
        let backends = Backends {
            cache: cache.clone(),
            remote: None,
            notifier: Arc::new(RecordingNotifier::default()),
        };
        let config = AutoSaveConfig {
            enabled: true,
            storage: StorageMode::Local,
            interval: Duration::from_secs(5),
            key_prefix: "f".into(),
        };
        let coordinator = PersistenceCoordinator::new(backends, config, FormBinding::new("intake"));
        let _timer = AutoSaveTimer::spawn(&coordinator);

        coordinator.set_snapshot(snapshot(json!({"name": "Ana"}))).await;
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        let raw = cache.get("f_intake_anonymous").await?.expect("envelope written");
        let envelope: StorageEnvelope = serde_json::from_str(&raw)?;
        assert_eq!(envelope.data, snapshot(json!({"name": "Ana"})));
        assert_eq!(envelope.owner_id, None);
        Ok(())
    }
}
