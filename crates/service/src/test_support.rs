#![cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::autosave::FormSnapshot;
use crate::errors::PersistenceError;
use crate::notify::{Notice, Notifier};
use crate::remote::{MemoryRecordStore, Record, RecordStore};
use crate::storage::LocalCache;

pub fn snapshot(v: Value) -> FormSnapshot {
    v.as_object().cloned().expect("snapshot must be a JSON object")
}

/// Keeps every notice for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}

/// Wraps a cache and counts every call that reaches it.
pub struct CountingCache<C> {
    inner: C,
    calls: AtomicUsize,
}

impl<C> CountingCache<C> {
    pub fn new(inner: C) -> Self { Self { inner, calls: AtomicUsize::new(0) } }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl<C: LocalCache> LocalCache for CountingCache<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key).await
    }
}

/// Remote store that is always down.
pub struct FailingRecordStore;

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn insert(&self, _table: &str, _record: Record) -> Result<Record, PersistenceError> {
        Err(PersistenceError::RemoteSave("connection refused".into()))
    }

    async fn update(&self, _table: &str, _id: &str, _owner_id: &str, _patch: Record) -> Result<Record, PersistenceError> {
        Err(PersistenceError::RemoteSave("connection refused".into()))
    }
}

/// Wraps a store; every write blocks until the returned gate is notified.
pub struct GatedRecordStore<S> {
    inner: S,
    gate: Arc<Notify>,
}

impl<S> GatedRecordStore<S> {
    pub fn new(inner: S) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Self { inner, gate: gate.clone() }, gate)
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for GatedRecordStore<S> {
    async fn insert(&self, table: &str, record: Record) -> Result<Record, PersistenceError> {
        self.gate.notified().await;
        self.inner.insert(table, record).await
    }

    async fn update(&self, table: &str, id: &str, owner_id: &str, patch: Record) -> Result<Record, PersistenceError> {
        self.gate.notified().await;
        self.inner.update(table, id, owner_id, patch).await
    }
}

/// In-memory store that keeps every payload it was handed, tagged with the
/// id of the update (`None` for inserts).
#[derive(Default)]
pub struct RecordingRecordStore {
    pub inner: MemoryRecordStore,
    writes: Mutex<Vec<(Option<String>, Record)>>,
}

impl RecordingRecordStore {
    pub fn writes(&self) -> Vec<(Option<String>, Record)> {
        self.writes.lock().expect("writes lock").clone()
    }
}

#[async_trait]
impl RecordStore for RecordingRecordStore {
    async fn insert(&self, table: &str, record: Record) -> Result<Record, PersistenceError> {
        self.writes.lock().expect("writes lock").push((None, record.clone()));
        self.inner.insert(table, record).await
    }

    async fn update(&self, table: &str, id: &str, owner_id: &str, patch: Record) -> Result<Record, PersistenceError> {
        self.writes.lock().expect("writes lock").push((Some(id.to_string()), patch.clone()));
        self.inner.update(table, id, owner_id, patch).await
    }
}
