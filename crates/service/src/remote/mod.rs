//! Remote record store: a hosted database reachable over HTTP with
//! per-record upsert semantics and per-user row ownership.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::PersistenceError;

pub mod memory;
pub mod rest;

pub use memory::MemoryRecordStore;
pub use rest::RestRecordStore;

/// One row as the store sees it.
pub type Record = Map<String, Value>;

/// Primary key column, assigned by the store.
pub const ID_COLUMN: &str = "id";

/// Column holding the owner id on every row.
pub const OWNER_COLUMN: &str = "user_id";

/// Trait abstraction for table-scoped record storage.
/// Implementations can be REST-backed or in-process.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row and return it as stored (including its `id`).
    async fn insert(&self, table: &str, record: Record) -> Result<Record, PersistenceError>;

    /// Patch the row matching both `id` and `owner_id`.
    /// No matching row is an error: the owner filter is mandatory.
    async fn update(&self, table: &str, id: &str, owner_id: &str, patch: Record) -> Result<Record, PersistenceError>;
}

/// Extract the `id` column of a stored row as a string, whatever its JSON type.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get(ID_COLUMN)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_accepts_strings_and_numbers() {
        let mut r = Record::new();
        assert_eq!(record_id(&r), None);
        r.insert("id".into(), json!("abc"));
        assert_eq!(record_id(&r).as_deref(), Some("abc"));
        r.insert("id".into(), json!(42));
        assert_eq!(record_id(&r).as_deref(), Some("42"));
        r.insert("id".into(), json!(null));
        assert_eq!(record_id(&r), None);
    }
}
