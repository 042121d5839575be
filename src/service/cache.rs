use super::{CacheService, Faults, Service};
use crate::config::ServiceConfig;
use crate::error::{LoadError, ServiceError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-local key/value cache, used for smoke runs and tests
pub struct InMemoryCache {
    store: RwLock<HashMap<String, String>>,
    started: AtomicBool,
    faults: Faults,
}

impl InMemoryCache {
    pub const NAME: &'static str = "in-memory-cache";

    pub fn new(latency_ms: u64, fail_every: Option<u64>, failure_message: Option<String>) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            started: AtomicBool::new(false),
            faults: Faults::new(latency_ms, fail_every, failure_message),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Arc<dyn Service>, LoadError> {
        match config {
            ServiceConfig::Cache(cache) => Ok(Arc::new(Self::new(
                cache.latency_ms,
                cache.fail_every,
                cache.failure_message.clone(),
            ))),
            ServiceConfig::Messaging(_) => Err(LoadError::config(
                "service.type",
                format!("{} requires a cache service configuration", Self::NAME),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_started(&self) -> Result<(), ServiceError> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ServiceError::NotStarted(Self::NAME.to_string()))
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            started: AtomicBool::new(false),
            faults: Faults::none(),
        }
    }
}

impl Service for InMemoryCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn start(&self) -> Result<(), ServiceError> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.started.store(false, Ordering::Release);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn cache(&self) -> Option<&dyn CacheService> {
        Some(self)
    }
}

impl CacheService for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        self.check_started()?;
        self.faults.before_call()?;
        Ok(self.store.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.check_started()?;
        self.faults.before_call()?;
        self.store.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        self.check_started()?;
        self.faults.before_call()?;
        Ok(self.store.write().remove(key).is_some())
    }
}
