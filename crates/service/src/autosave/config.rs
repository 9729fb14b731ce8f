use std::time::Duration;

use configs::AutoSaveSettings;
pub use configs::StorageMode;

/// Per-coordinator auto-save settings; fixed for the coordinator's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    pub storage: StorageMode,
    pub interval: Duration,
    pub key_prefix: String,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self::from(&AutoSaveSettings::default())
    }
}

impl From<&AutoSaveSettings> for AutoSaveConfig {
    fn from(s: &AutoSaveSettings) -> Self {
        Self {
            enabled: s.enabled,
            storage: s.storage,
            interval: Duration::from_secs(s.interval_secs),
            key_prefix: s.key_prefix.clone(),
        }
    }
}

/// Cache key for one form/owner pair: `{prefix}_{table}_{owner | anonymous}`.
pub fn storage_key(prefix: &str, table: &str, owner_id: Option<&str>) -> String {
    format!("{}_{}_{}", prefix, table, owner_id.unwrap_or("anonymous"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_anonymous_without_owner() {
        assert_eq!(storage_key("f", "intake", None), "f_intake_anonymous");
        assert_eq!(storage_key("f", "intake", Some("u1")), "f_intake_u1");
        assert_ne!(storage_key("f", "intake", Some("u1")), storage_key("f", "profile", Some("u1")));
    }

    #[test]
    fn converts_from_settings() {
        let s = AutoSaveSettings {
            enabled: false,
            storage: StorageMode::Remote,
            interval_secs: 7,
            key_prefix: "p".into(),
        };
        let c = AutoSaveConfig::from(&s);
        assert!(!c.enabled);
        assert_eq!(c.storage, StorageMode::Remote);
        assert_eq!(c.interval, Duration::from_secs(7));
    }
}
