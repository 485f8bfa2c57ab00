use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// hourly | daily | never
    pub rotation: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "holding_ledger.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            store: StoreConfig::default(),
            oracle: OracleConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub postgres_url: Option<String>,
    pub max_connections: u32,
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            postgres_url: None,
            max_connections: 16,
            lock_timeout_ms: 2000,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleBackend {
    Table,
    Http,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OracleConfig {
    pub backend: OracleBackend,
    pub http_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: OracleBackend::Table,
            http_url: None,
            timeout_ms: 1500,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Internal retry of transient aborts
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub queue_size: usize,
    pub max_delivery_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            max_delivery_attempts: 5,
            retry_backoff_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> anyhow::Result<Self> {
        Self::load_from(format!("config/{}.yaml", env))
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.store.postgres_url.is_none() {
            anyhow::bail!("store.postgres_url is required for the postgres backend");
        }
        if self.oracle.backend == OracleBackend::Http && self.oracle.http_url.is_none() {
            anyhow::bail!("oracle.http_url is required for the http oracle");
        }
        if self.orchestrator.max_attempts == 0 {
            anyhow::bail!("orchestrator.max_attempts must be at least 1");
        }
        Ok(())
    }
}
