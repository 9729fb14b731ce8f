use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub autosave: AutoSaveSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub remote: RemoteStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where a coordinator prefers to persist its drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoSaveSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub storage: StorageMode,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            storage: StorageMode::Local,
            interval_secs: default_interval(),
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// JSON file backing the local cache; empty keeps drafts in memory.
    #[serde(default = "default_cache_path")]
    pub path: String,
    #[serde(default = "default_quota")]
    pub quota_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_cache_path(), quota_bytes: default_quota() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemoteStoreConfig {
    /// Base URL of the hosted database REST endpoint, e.g. `https://xyz.example.co`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_enabled() -> bool { true }
fn default_interval() -> u64 { 30 }
fn default_key_prefix() -> String { "form_autosave".to_string() }
fn default_cache_path() -> String { "data/drafts.json".to_string() }
// browsers typically cap local storage at ~5 MiB per origin
fn default_quota() -> usize { 5 * 1024 * 1024 }
fn default_request_timeout() -> u64 { 10 }

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

/// Defaults only when the file does not exist; unreadable or unparsable
/// files are errors.
pub fn load_from_file_or_default(path: &str) -> Result<AppConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => load_from_str(&content).map_err(|e| anyhow!("{path}: {e}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(anyhow!("cannot read {path}: {e}")),
    }
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.toml`), then apply environment
    /// overrides and validate. A missing file yields defaults; a broken one
    /// is an error.
    pub fn load_or_default() -> Result<Self> {
        let mut cfg = load_from_file_or_default(&config_path())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server（允许环境变量覆盖）
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.autosave.validate()?;
        // 远端存储 URL / key 可以只放在环境变量里
        self.remote.normalize_from_env();
        self.remote.validate(self.autosave.storage)?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(n) = std::env::var("TOKIO_WORKER_THREADS").ok().and_then(|n| n.parse::<usize>().ok()) {
            self.worker_threads = Some(n);
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port 必须在 1..=65535 范围内"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl AutoSaveSettings {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(anyhow!("autosave.interval_secs must be >= 1"));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(anyhow!("autosave.key_prefix must not be empty"));
        }
        Ok(())
    }
}

impl RemoteStoreConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("REMOTE_STORE_URL") {
                self.url = url;
            }
        }
        if self.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("REMOTE_STORE_KEY") {
                self.api_key = key;
            }
        }
        self.url = self.url.trim().trim_end_matches('/').to_string();
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn validate(&self, storage: StorageMode) -> Result<()> {
        if !self.is_configured() {
            // local mode never talks to the remote store
            return Ok(());
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("remote.url must start with http:// or https://"));
        }
        if storage == StorageMode::Remote && self.api_key.trim().is_empty() {
            return Err(anyhow!("remote.api_key is empty; set it in config.toml or REMOTE_STORE_KEY"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("remote.request_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }
}
