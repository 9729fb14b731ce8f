use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::autosave::coordinator::PersistenceCoordinator;

struct Running {
    interval: Duration,
    // dropping the sender stops the loop
    _stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic trigger for [`PersistenceCoordinator::auto_save`].
///
/// At most one loop is alive per timer: rescheduling stops the previous
/// loop before starting the next, and dropping the timer stops it too.
/// Stopping never interrupts a save that is already running.
pub struct AutoSaveTimer {
    coordinator: Weak<PersistenceCoordinator>,
    running: Option<Running>,
}

impl AutoSaveTimer {
    /// Start ticking with the coordinator's own `enabled` / `interval`.
    pub fn spawn(coordinator: &Arc<PersistenceCoordinator>) -> Self {
        let mut timer = Self { coordinator: Arc::downgrade(coordinator), running: None };
        let cfg = coordinator.config();
        timer.reschedule(cfg.enabled, cfg.interval);
        timer
    }

    /// Apply a new schedule. A schedule identical to the running one is left
    /// alone; anything else tears the old loop down first.
    pub fn reschedule(&mut self, enabled: bool, interval: Duration) {
        if let Some(running) = &self.running {
            if enabled && running.interval == interval && !running.handle.is_finished() {
                return;
            }
        }
        self.stop();
        if !enabled || interval.is_zero() {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(self.coordinator.clone(), interval, stop_rx));
        debug!(?interval, "auto-save timer started");
        self.running = Some(Running { interval, _stop: stop_tx, handle });
    }

    pub fn stop(&mut self) {
        if self.running.take().is_some() {
            debug!("auto-save timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.handle.is_finished())
    }
}

async fn run_loop(coordinator: Weak<PersistenceCoordinator>, interval: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let Some(c) = coordinator.upgrade() else {
                    info!("coordinator dropped; auto-save timer exiting");
                    break;
                };
                c.auto_save().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::sleep;

    use crate::autosave::{AutoSaveConfig, Backends, FormBinding, StorageMode};
    use crate::storage::{LocalCache, MemoryCache};
    use crate::test_support::{snapshot, RecordingNotifier};

    fn coordinator(cache: Arc<MemoryCache>, enabled: bool) -> Arc<PersistenceCoordinator> {
        let backends = Backends { cache, remote: None, notifier: Arc::new(RecordingNotifier::default()) };
        let cfg = AutoSaveConfig {
            enabled,
            storage: StorageMode::Local,
            interval: Duration::from_secs(5),
            key_prefix: "f".into(),
        };
        PersistenceCoordinator::new(backends, cfg, FormBinding::new("intake"))
    }

    #[tokio::test(start_paused = true)]
    async fn saves_after_one_interval() -> anyhow::Result<()> {
        let cache = Arc::new(MemoryCache::new());
        let c = coordinator(cache.clone(), true);
        let _timer = AutoSaveTimer::spawn(&c);
        c.set_snapshot(snapshot(json!({"name": "Ana"}))).await;

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(cache.get("f_intake_anonymous").await?, None);

        sleep(Duration::from_millis(200)).await;
        let raw = cache.get("f_intake_anonymous").await?.expect("saved after first tick");
        let env: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(env["data"], json!({"name": "Ana"}));
        assert!(!c.state().has_unsaved_changes);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_config_never_ticks() {
        let cache = Arc::new(MemoryCache::new());
        let c = coordinator(cache.clone(), false);
        let timer = AutoSaveTimer::spawn(&c);
        assert!(!timer.is_running());
        c.set_snapshot(snapshot(json!({"name": "Ana"}))).await;
        sleep(Duration::from_secs(30)).await;
        assert!(c.state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous_loop() {
        let cache = Arc::new(MemoryCache::new());
        let c = coordinator(cache.clone(), true);
        let mut timer = AutoSaveTimer::spawn(&c);
        timer.reschedule(true, Duration::from_secs(60));
        c.set_snapshot(snapshot(json!({"name": "Ana"}))).await;

        // the original 5s loop must be gone
        sleep(Duration::from_secs(10)).await;
        assert!(c.state().has_unsaved_changes);

        sleep(Duration::from_secs(51)).await;
        assert!(!c.state().has_unsaved_changes);
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_drop_end_the_loop() {
        let cache = Arc::new(MemoryCache::new());
        let c = coordinator(cache.clone(), true);
        let mut timer = AutoSaveTimer::spawn(&c);
        assert!(timer.is_running());
        timer.stop();
        assert!(!timer.is_running());

        c.set_snapshot(snapshot(json!({"name": "Ana"}))).await;
        sleep(Duration::from_secs(20)).await;
        assert!(c.state().has_unsaved_changes);

        let timer = AutoSaveTimer::spawn(&c);
        drop(timer);
        sleep(Duration::from_secs(20)).await;
        assert!(c.state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_coordinator_ends_loop() {
        let cache = Arc::new(MemoryCache::new());
        let c = coordinator(cache, true);
        let timer = AutoSaveTimer::spawn(&c);
        drop(c);
        sleep(Duration::from_secs(6)).await;
        assert!(!timer.is_running());
    }
}
