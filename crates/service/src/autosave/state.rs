use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current value of a form: field name to value, never interpreted here.
pub type FormSnapshot = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveState {
    pub last_saved: Option<DateTime<Utc>>,
    pub is_saving: bool,
    pub has_unsaved_changes: bool,
}

/// What is written to the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEnvelope {
    pub data: FormSnapshot,
    /// ISO-8601 / RFC 3339 save time.
    pub timestamp: String,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl StorageEnvelope {
    pub fn new(data: FormSnapshot, at: DateTime<Utc>, owner_id: Option<String>) -> Self {
        Self { data, timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true), owner_id }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok().map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn envelope_wire_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let data = json!({"name": "Ana"}).as_object().cloned().unwrap();
        let env = StorageEnvelope::new(data, at, None);
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v, json!({"data": {"name": "Ana"}, "timestamp": "2024-05-01T12:00:00.000Z", "owner_id": null}));
        assert_eq!(env.saved_at(), Some(at));
    }

    #[test]
    fn envelope_tolerates_missing_owner() {
        let env: StorageEnvelope =
            serde_json::from_str(r#"{"data":{},"timestamp":"2024-05-01T12:00:00Z"}"#).unwrap();
        assert_eq!(env.owner_id, None);
    }
}
