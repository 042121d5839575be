//! Run configuration, loaded from a JSON file and threaded through constructors.

use crate::constants::*;
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfiguration {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
    #[serde(default = "default_sampler_run_interval_ms")]
    pub sampler_run_interval_ms: u64,
    /// Fixed delay between two operations of one worker
    #[serde(default)]
    pub sleep_ms: u64,
    /// Run length; without it the run ends when the strategies run out of operations
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// CSV output file; stdout when absent
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub strategy: StrategyConfig,
    pub service: ServiceConfig,
    /// Shared key store recording keys written during the run
    #[serde(default)]
    pub key_store: Option<KeyStoreConfig>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_sampling_interval_ms() -> u64 {
    DEFAULT_SAMPLING_INTERVAL_MS
}

fn default_sampler_run_interval_ms() -> u64 {
    DEFAULT_SAMPLER_RUN_INTERVAL_MS
}

fn default_key_size() -> usize {
    DEFAULT_KEY_SIZE
}

fn default_value_size() -> usize {
    DEFAULT_VALUE_SIZE
}

fn default_message_size() -> usize {
    DEFAULT_MESSAGE_SIZE
}

fn default_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

fn default_cache_implementation() -> String {
    crate::service::InMemoryCache::NAME.to_string()
}

fn default_broker_implementation() -> String {
    crate::service::InMemoryBroker::NAME.to_string()
}

/// Options consumed by the load strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default = "default_key_size")]
    pub key_size: usize,
    #[serde(default = "default_value_size")]
    pub value_size: usize,
    /// Reads issued per write, e.g. 3 means one write followed by three reads
    #[serde(default)]
    pub read_to_write: Option<u32>,
    /// Writes issued per read, e.g. 3 means one read followed by three writes
    #[serde(default)]
    pub write_to_read: Option<u32>,
    /// Bound on the keys (or messages) a strategy generates
    #[serde(default)]
    pub key_count: Option<u64>,
    /// Explicit key set, used by the delete strategy
    #[serde(default)]
    pub keys: Vec<String>,
    /// Read keys from the shared key store instead of generating them
    #[serde(default)]
    pub use_key_store: bool,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_message_size")]
    pub message_size: usize,
}

impl StrategyConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key_size: DEFAULT_KEY_SIZE,
            value_size: DEFAULT_VALUE_SIZE,
            read_to_write: None,
            write_to_read: None,
            key_count: None,
            keys: Vec::new(),
            use_key_store: false,
            destination: None,
            message_size: DEFAULT_MESSAGE_SIZE,
        }
    }
}

/// Which kind of backend the run targets, with that backend's options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServiceConfig {
    Cache(CacheServiceConfig),
    Messaging(MessagingServiceConfig),
}

impl ServiceConfig {
    pub fn implementation(&self) -> &str {
        match self {
            Self::Cache(c) => &c.implementation,
            Self::Messaging(m) => &m.implementation,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cache(_) => "cache",
            Self::Messaging(_) => "messaging",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheServiceConfig {
    #[serde(default = "default_cache_implementation")]
    pub implementation: String,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub fail_every: Option<u64>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl Default for CacheServiceConfig {
    fn default() -> Self {
        Self {
            implementation: default_cache_implementation(),
            latency_ms: 0,
            fail_every: None,
            failure_message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingServiceConfig {
    #[serde(default = "default_broker_implementation")]
    pub implementation: String,
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub fail_every: Option<u64>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl Default for MessagingServiceConfig {
    fn default() -> Self {
        Self {
            implementation: default_broker_implementation(),
            destination: default_destination(),
            latency_ms: 0,
            fail_every: None,
            failure_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyStoreConfig {
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Keys present in the store before the run starts
    #[serde(default)]
    pub keys: Vec<String>,
}

impl LoadConfiguration {
    pub fn new(strategy: StrategyConfig, service: ServiceConfig) -> Self {
        Self {
            threads: DEFAULT_THREADS,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            sampler_run_interval_ms: DEFAULT_SAMPLER_RUN_INTERVAL_MS,
            sleep_ms: 0,
            duration_secs: None,
            output: None,
            strategy,
            service,
            key_store: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LoadError::config("config", format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| LoadError::config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that can be checked without constructing components
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.threads == 0 {
            return Err(LoadError::config("threads", "must be greater than 0"));
        }
        if self.sampling_interval_ms == 0 {
            return Err(LoadError::config(
                "sampling_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.sampler_run_interval_ms == 0 {
            return Err(LoadError::config(
                "sampler_run_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.sampler_run_interval_ms > self.sampling_interval_ms {
            return Err(LoadError::config(
                "sampler_run_interval_ms",
                format!(
                    "{} ms is longer than the sampling interval ({} ms)",
                    self.sampler_run_interval_ms, self.sampling_interval_ms
                ),
            ));
        }
        if self.duration_secs == Some(0) {
            return Err(LoadError::config("duration_secs", "must be greater than 0"));
        }
        if self.strategy.name.trim().is_empty() {
            return Err(LoadError::config("strategy.name", "must not be empty"));
        }
        match (self.strategy.read_to_write, self.strategy.write_to_read) {
            (Some(1), Some(1)) | (None, _) | (_, None) => {}
            (Some(_), Some(_)) => {
                return Err(LoadError::config(
                    "strategy.read_to_write",
                    "cannot be combined with write_to_read unless both are 1",
                ))
            }
        }
        if self.strategy.use_key_store && self.key_store.is_none() {
            return Err(LoadError::config(
                "strategy.use_key_store",
                "requires a key_store section",
            ));
        }
        Ok(())
    }

    pub fn sleep(&self) -> Option<Duration> {
        (self.sleep_ms > 0).then(|| Duration::from_millis(self.sleep_ms))
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = LoadConfiguration::from_json(
            r#"{
                "strategy": { "name": "write-then-read" },
                "service": { "type": "cache" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.sampling_interval_ms, DEFAULT_SAMPLING_INTERVAL_MS);
        assert_eq!(config.strategy.key_size, DEFAULT_KEY_SIZE);
        assert_eq!(config.service.implementation(), "in-memory-cache");
        assert_eq!(config.service.kind(), "cache");
        assert!(config.sleep().is_none());
    }

    #[test]
    fn test_messaging_service_section() {
        let config = LoadConfiguration::from_json(
            r#"{
                "threads": 4,
                "duration_secs": 5,
                "strategy": { "name": "send", "message_size": 64 },
                "service": { "type": "messaging", "destination": "orders", "latency_ms": 2 }
            }"#,
        )
        .unwrap();
        match &config.service {
            ServiceConfig::Messaging(m) => {
                assert_eq!(m.destination, "orders");
                assert_eq!(m.latency_ms, 2);
            }
            other => panic!("unexpected service {:?}", other),
        }
        assert_eq!(config.duration(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = LoadConfiguration::from_json(
            r#"{ "threads": 0, "strategy": { "name": "delete" }, "service": { "type": "cache" } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn test_rejects_run_interval_longer_than_sampling_interval() {
        let mut config = LoadConfiguration::new(
            StrategyConfig::named("delete"),
            ServiceConfig::Cache(CacheServiceConfig::default()),
        );
        config.sampling_interval_ms = 100;
        config.sampler_run_interval_ms = 500;
        assert!(matches!(config.validate(), Err(LoadError::Config { .. })));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = LoadConfiguration::from_json(
            r#"{ "thread": 2, "strategy": { "name": "delete" }, "service": { "type": "cache" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Config { .. }));
    }

    #[test]
    fn test_key_store_required_when_used() {
        let err = LoadConfiguration::from_json(
            r#"{ "strategy": { "name": "delete", "use_key_store": true }, "service": { "type": "cache" } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("key_store"));
    }

    #[test]
    fn test_rejects_conflicting_ratios() {
        let err = LoadConfiguration::from_json(
            r#"{ "strategy": { "name": "write-then-read", "read_to_write": 2, "write_to_read": 3 },
                 "service": { "type": "cache" } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("read_to_write"));

        let config = LoadConfiguration::from_json(
            r#"{ "strategy": { "name": "write-then-read", "read_to_write": 1, "write_to_read": 1 },
                 "service": { "type": "cache" } }"#,
        );
        assert!(config.is_ok());
    }
}
