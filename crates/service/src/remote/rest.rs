use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument};

use configs::RemoteStoreConfig;

use crate::errors::PersistenceError;
use crate::remote::{Record, RecordStore, OWNER_COLUMN};

/// Record store speaking the PostgREST dialect used by hosted Postgres
/// services: `POST /rest/v1/{table}` inserts, `PATCH` with `eq.` filters
/// updates.
///
/// Built once at startup and shared; the underlying `reqwest::Client`
/// pools connections.
#[derive(Clone)]
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PersistenceError::remote)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(cfg: &RemoteStoreConfig) -> Result<Self, PersistenceError> {
        Self::new(&cfg.url, &cfg.api_key, Duration::from_secs(cfg.request_timeout_secs))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn rows(resp: Response) -> Result<Vec<Record>, PersistenceError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PersistenceError::RemoteSave(format!("status {status}: {body}")));
        }
        let json = resp.json::<Value>().await.map_err(PersistenceError::remote)?;
        match json {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(m),
                    _ => None,
                })
                .collect()),
            Value::Object(m) => Ok(vec![m]),
            other => Err(PersistenceError::RemoteSave(format!("unexpected response body: {other}"))),
        }
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    #[instrument(skip(self, record))]
    async fn insert(&self, table: &str, record: Record) -> Result<Record, PersistenceError> {
        let resp = self
            .authorized(self.client.post(self.table_url(table)))
            .json(&record)
            .send()
            .await
            .map_err(PersistenceError::remote)?;
        let row = Self::rows(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistenceError::RemoteSave("insert returned no rows".into()))?;
        debug!("remote insert ok");
        Ok(row)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, table: &str, id: &str, owner_id: &str, patch: Record) -> Result<Record, PersistenceError> {
        let id_filter = format!("eq.{id}");
        let owner_filter = format!("eq.{owner_id}");
        let resp = self
            .authorized(self.client.patch(self.table_url(table)))
            .query(&[("id", id_filter.as_str()), (OWNER_COLUMN, owner_filter.as_str())])
            .json(&patch)
            .send()
            .await
            .map_err(PersistenceError::remote)?;
        let row = Self::rows(resp).await?.into_iter().next().ok_or_else(|| {
            PersistenceError::RemoteSave(format!("no row {table}/{id} owned by {owner_id}"))
        })?;
        debug!("remote update ok");
        Ok(row)
    }
}
