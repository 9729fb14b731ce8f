use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use service::autosave::{format_last_saved, FormSnapshot, PersistenceCoordinator, StorageEnvelope};

use crate::errors::ApiError;
use crate::registry::{DraftKey, DraftSession};
use crate::routes::ServerState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotInput {
    pub owner_id: Option<String>,
    pub record_id: Option<String>,
    pub data: FormSnapshot,
}

#[derive(Debug, Serialize)]
pub struct DraftStatus {
    pub table: String,
    pub owner_id: Option<String>,
    pub storage_key: String,
    pub record_id: Option<String>,
    pub last_saved: Option<DateTime<Utc>>,
    pub is_saving: bool,
    pub has_unsaved_changes: bool,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub status: DraftStatus,
}

/// Table names end up in remote URLs; keep them to identifier characters.
fn validate_table(table: &str) -> Result<(), ApiError> {
    let ok = !table.is_empty()
        && table.len() <= 64
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("invalid table name: {table:?}")))
    }
}

fn normalize_owner(owner_id: Option<String>) -> Option<String> {
    owner_id.map(|o| o.trim().to_string()).filter(|o| !o.is_empty())
}

fn draft_key(table: String, owner_id: Option<String>) -> Result<DraftKey, ApiError> {
    validate_table(&table)?;
    Ok(DraftKey { table, owner_id: normalize_owner(owner_id) })
}

/// Live session for the key; reads never open one.
fn open_session(state: &ServerState, key: &DraftKey) -> Result<Arc<DraftSession>, ApiError> {
    state.registry.get(key).ok_or_else(|| {
        ApiError::not_found(format!("no open draft for {} ({})", key.table, key.owner_id.as_deref().unwrap_or("anonymous")))
    })
}

async fn status_of(c: &PersistenceCoordinator) -> DraftStatus {
    let s = c.state();
    DraftStatus {
        table: c.table().to_string(),
        owner_id: c.owner_id().map(str::to_string),
        storage_key: c.storage_key().to_string(),
        record_id: c.record_id().await,
        last_saved: s.last_saved,
        is_saving: s.is_saving,
        has_unsaved_changes: s.has_unsaved_changes,
        label: format_last_saved(s.last_saved, Utc::now()),
    }
}

/// Replace the draft snapshot, opening the session on first use; the
/// auto-save timer picks it up.
pub async fn put_snapshot(
    State(state): State<ServerState>,
    Path(table): Path<String>,
    Json(input): Json<SnapshotInput>,
) -> Result<Json<DraftStatus>, ApiError> {
    let key = draft_key(table, input.owner_id)?;
    let s = state.registry.get_or_create(key, input.record_id);
    s.coordinator.set_snapshot(input.data).await;
    Ok(Json(status_of(&s.coordinator).await))
}

pub async fn save_draft(
    State(state): State<ServerState>,
    Path(table): Path<String>,
    Query(q): Query<OwnerQuery>,
) -> Result<Json<SaveResponse>, ApiError> {
    let s = open_session(&state, &draft_key(table, q.owner_id)?)?;
    let saved = s.coordinator.save_now().await;
    Ok(Json(SaveResponse { saved, status: status_of(&s.coordinator).await }))
}

pub async fn load_draft(
    State(state): State<ServerState>,
    Path(table): Path<String>,
    Query(q): Query<OwnerQuery>,
) -> Result<Json<StorageEnvelope>, ApiError> {
    let key = draft_key(table, q.owner_id)?;
    match state.registry.load(&key).await {
        Some(envelope) => Ok(Json(envelope)),
        None => Err(ApiError::not_found(format!("no saved draft at {}", state.registry.storage_key(&key)))),
    }
}

pub async fn draft_status(
    State(state): State<ServerState>,
    Path(table): Path<String>,
    Query(q): Query<OwnerQuery>,
) -> Result<Json<DraftStatus>, ApiError> {
    let s = open_session(&state, &draft_key(table, q.owner_id)?)?;
    Ok(Json(status_of(&s.coordinator).await))
}

pub async fn clear_draft(
    State(state): State<ServerState>,
    Path(table): Path<String>,
    Query(q): Query<OwnerQuery>,
) -> Result<StatusCode, ApiError> {
    let key = draft_key(table, q.owner_id)?;
    state.registry.discard(&key).await;
    info!(key = %state.registry.storage_key(&key), event = "draft_deleted", "draft deleted via api");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_identifiers() {
        assert!(validate_table("intake").is_ok());
        assert!(validate_table("visa_form-2").is_ok());
        assert!(validate_table("").is_err());
        assert!(validate_table("../etc").is_err());
        assert!(validate_table(&"a".repeat(65)).is_err());
    }

    #[test]
    fn blank_owner_is_anonymous() {
        assert_eq!(normalize_owner(Some("  ".into())), None);
        assert_eq!(normalize_owner(Some(" u1 ".into())).as_deref(), Some("u1"));
        assert_eq!(normalize_owner(None), None);
    }
}
