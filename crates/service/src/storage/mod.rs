//! Local key-value cache used as the unconditional fallback sink for drafts.
//!
//! Mirrors the browser local-storage contract: string keys, string values,
//! a per-origin size quota.

use async_trait::async_trait;

use crate::errors::PersistenceError;

pub mod json_map_store;
pub mod memory;

pub use json_map_store::JsonFileCache;
pub use memory::MemoryCache;

#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Bytes a map of entries would occupy, counted the way browsers count
/// local storage usage (key length plus value length).
pub(crate) fn usage_with<'a, I>(entries: I, key: &str, value: &str) -> usize
where
    I: Iterator<Item = (&'a String, &'a String)>,
{
    let others: usize = entries
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
    others + key.len() + value.len()
}
