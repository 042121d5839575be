//! Services execute operations against the system under load.
//!
//! A [`Service`] has a start/stop lifecycle and exposes the capabilities it
//! supports: [`CacheService`] for key/value traffic, [`MessagingService`] for
//! broker traffic. One instance is shared by all workers; per-worker state
//! such as a broker session travels in the explicit [`WorkerContext`].

mod broker;
mod cache;
mod faults;

pub use broker::InMemoryBroker;
pub use cache::InMemoryCache;
pub(crate) use faults::Faults;

use crate::config::ServiceConfig;
use crate::error::{LoadError, ServiceError};
use crate::operation::Operation;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self) -> Result<(), ServiceError>;

    fn stop(&self) -> Result<(), ServiceError>;

    fn is_started(&self) -> bool;

    fn cache(&self) -> Option<&dyn CacheService> {
        None
    }

    fn messaging(&self) -> Option<&dyn MessagingService> {
        None
    }
}

impl dyn Service {
    /// Executes one operation; any error is an operational failure of that operation
    pub fn perform(&self, op: &mut Operation, ctx: &mut WorkerContext) -> Result<(), ServiceError> {
        op.perform(self, ctx)
    }
}

pub trait CacheService: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    fn put(&self, key: &str, value: &str) -> Result<(), ServiceError>;

    /// Returns whether the key existed
    fn remove(&self, key: &str) -> Result<bool, ServiceError>;
}

pub trait MessagingService: Send + Sync {
    fn send(
        &self,
        ctx: &mut WorkerContext,
        destination: &str,
        payload: &str,
    ) -> Result<(), ServiceError>;

    fn receive(
        &self,
        ctx: &mut WorkerContext,
        destination: &str,
    ) -> Result<Option<String>, ServiceError>;

    fn close_session(&self, ctx: &mut WorkerContext) -> Result<(), ServiceError>;
}

/// State owned by one worker and handed to every service call it makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    pub worker_id: usize,
    pub session: Option<u64>,
}

impl WorkerContext {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            session: None,
        }
    }
}

pub type ServiceConstructor = fn(&ServiceConfig) -> Result<Arc<dyn Service>, LoadError>;

/// Maps service implementation names to constructors
pub struct ServiceRegistry {
    constructors: BTreeMap<&'static str, ServiceConstructor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry holding the in-memory cache and broker
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(InMemoryCache::NAME, InMemoryCache::from_config);
        registry.register(InMemoryBroker::NAME, InMemoryBroker::from_config);
        registry
    }

    /// Registers a constructor, replacing any previous one with the same name
    pub fn register(&mut self, name: &'static str, constructor: ServiceConstructor) {
        if self.constructors.insert(name, constructor).is_some() {
            tracing::debug!(service = name, "Replacing registered service");
        }
    }

    pub fn create(&self, config: &ServiceConfig) -> Result<Arc<dyn Service>, LoadError> {
        let name = config.implementation();
        let constructor = self.constructors.get(name).ok_or_else(|| {
            LoadError::config(
                "service.implementation",
                format!("unknown service '{}' (known: {})", name, self.names().join(", ")),
            )
        })?;
        constructor(config)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
