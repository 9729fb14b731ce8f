use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::remote::{Record, RecordStore, ID_COLUMN, OWNER_COLUMN};

/// In-process record store keyed by `(table, id)`.
///
/// Enforces the same owner scoping as the hosted store: an update whose
/// owner does not match the row's `user_id` matches nothing.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: DashMap<(String, String), Record>,
}

impl MemoryRecordStore {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, table: &str, id: &str) -> Option<Record> {
        self.rows.get(&(table.to_string(), id.to_string())).map(|r| r.value().clone())
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows.iter().filter(|e| e.key().0 == table).count()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, table: &str, mut record: Record) -> Result<Record, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        record.insert(ID_COLUMN.into(), Value::String(id.clone()));
        self.rows.insert((table.to_string(), id), record.clone());
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, owner_id: &str, patch: Record) -> Result<Record, PersistenceError> {
        let key = (table.to_string(), id.to_string());
        let mut row = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| PersistenceError::RemoteSave(format!("no row {table}/{id}")))?;
        if row.get(OWNER_COLUMN).and_then(Value::as_str) != Some(owner_id) {
            return Err(PersistenceError::RemoteSave(format!("no row {table}/{id} owned by {owner_id}")));
        }
        for (k, v) in patch {
            if k != ID_COLUMN {
                row.insert(k, v);
            }
        }
        Ok(row.value().clone())
    }
}
