use thiserror::Error;

/// Failures raised by the persistence collaborators.
///
/// The coordinator never lets these escape to its callers; they are turned
/// into a boolean outcome (and, for remote failures, a user-visible notice).
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Quota exceeded, serialization failure or I/O on the local cache.
    #[error("local storage error: {0}")]
    LocalStorage(String),
    /// Network or store-side failure while writing the remote record.
    #[error("remote save error: {0}")]
    RemoteSave(String),
    /// A cache entry exists but does not deserialize into an envelope.
    #[error("malformed cache entry at {key}: {reason}")]
    MalformedCacheEntry { key: String, reason: String },
}

impl PersistenceError {
    pub fn local(err: impl std::fmt::Display) -> Self { Self::LocalStorage(err.to_string()) }

    pub fn remote(err: impl std::fmt::Display) -> Self { Self::RemoteSave(err.to_string()) }
}
