//! Load strategies decide which operation a worker issues next.
//!
//! Each worker owns one strategy instance. A strategy is initialized once
//! with the service and strategy configuration, started, asked for
//! operations until it returns `None`, then stopped. Keys come either from a
//! provider the strategy owns or from one shared between all workers.

mod delete;
mod messaging;
mod read_then_write;
mod write_then_read;

pub use delete::DeleteStrategy;
pub use messaging::{ReceiveStrategy, SendStrategy};
pub use read_then_write::ReadThenWriteOnMiss;
pub use write_then_read::WriteThenRead;

use crate::config::{ServiceConfig, StrategyConfig};
use crate::error::LoadError;
use crate::key::KeyProvider;
use crate::operation::{Operation, OperationType};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait LoadStrategy: Send {
    fn name(&self) -> &str;

    /// One-time setup. A second call fails with [`LoadError::IllegalState`].
    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig)
        -> Result<(), LoadError>;

    fn start(&mut self) -> Result<(), LoadError>;

    fn stop(&mut self) -> Result<(), LoadError>;

    fn is_started(&self) -> bool;

    /// Every operation type this strategy may issue
    fn operation_types(&self) -> Vec<OperationType>;

    /// Next operation, or `None` when the strategy has nothing left to do.
    ///
    /// `last` is the operation this worker performed before, with its
    /// outcome. Once `shutting_down` is set a strategy returns at most one
    /// cleanup operation and `None` afterwards.
    fn next(
        &mut self,
        last: Option<&Operation>,
        last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError>;

    /// Reads keys from a provider shared with other workers instead of one
    /// built in `init`. Must be called before `init`.
    fn attach_key_provider(&mut self, _provider: Arc<dyn KeyProvider>) -> Result<(), LoadError> {
        Err(LoadError::config(
            "strategy.use_key_store",
            format!("strategy '{}' does not read from a key store", self.name()),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl Lifecycle {
    fn init(&mut self, strategy: &str) -> Result<(), LoadError> {
        if *self != Lifecycle::Uninitialized {
            return Err(LoadError::illegal_state(format!(
                "{}: init() called twice",
                strategy
            )));
        }
        *self = Lifecycle::Initialized;
        Ok(())
    }

    fn start(&mut self, strategy: &str) -> Result<(), LoadError> {
        if *self != Lifecycle::Initialized {
            return Err(LoadError::illegal_state(format!(
                "{}: start() in state {:?}",
                strategy, self
            )));
        }
        *self = Lifecycle::Running;
        Ok(())
    }

    fn require_running(&self, strategy: &str) -> Result<(), LoadError> {
        match self {
            Lifecycle::Running => Ok(()),
            other => Err(LoadError::illegal_state(format!(
                "{}: next() in state {:?}",
                strategy, other
            ))),
        }
    }
}

/// Where a strategy gets its keys from
enum KeySource {
    /// Built in `init`, started and stopped with the strategy
    Owned(Box<dyn KeyProvider>),
    /// Shared between workers, its lifecycle belongs to the runner
    Shared(Arc<dyn KeyProvider>),
}

impl KeySource {
    fn provider(&self) -> &dyn KeyProvider {
        match self {
            KeySource::Owned(p) => p.as_ref(),
            KeySource::Shared(p) => p.as_ref(),
        }
    }
}

/// Lifecycle and key handling common to the built-in strategies
struct StrategyCore {
    name: &'static str,
    lifecycle: Lifecycle,
    shared: Option<Arc<dyn KeyProvider>>,
    keys: Option<KeySource>,
}

impl StrategyCore {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            lifecycle: Lifecycle::Uninitialized,
            shared: None,
            keys: None,
        }
    }

    fn attach(&mut self, provider: Arc<dyn KeyProvider>) -> Result<(), LoadError> {
        if self.lifecycle != Lifecycle::Uninitialized {
            return Err(LoadError::illegal_state(format!(
                "{}: key provider attached after init()",
                self.name
            )));
        }
        self.shared = Some(provider);
        Ok(())
    }

    /// Marks the strategy initialized and picks the key source; `build` is
    /// only called when no shared provider was attached
    fn init_keys<F>(&mut self, build: F) -> Result<(), LoadError>
    where
        F: FnOnce() -> Result<Option<Box<dyn KeyProvider>>, LoadError>,
    {
        self.lifecycle.init(self.name)?;
        self.keys = match self.shared.take() {
            Some(shared) => Some(KeySource::Shared(shared)),
            None => build()?.map(KeySource::Owned),
        };
        Ok(())
    }

    fn start(&mut self) -> Result<(), LoadError> {
        self.lifecycle.start(self.name)?;
        if let Some(KeySource::Owned(provider)) = &self.keys {
            provider.start()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), LoadError> {
        let was_running = self.lifecycle == Lifecycle::Running;
        self.lifecycle = Lifecycle::Stopped;
        match &self.keys {
            Some(KeySource::Owned(provider)) if was_running => provider.stop(),
            _ => Ok(()),
        }
    }

    fn is_started(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    fn require_running(&self) -> Result<(), LoadError> {
        self.lifecycle.require_running(self.name)
    }

    /// Keys left in the key source, `None` if unbounded or absent
    fn remaining_keys(&self) -> Option<u64> {
        self.keys.as_ref().and_then(|source| source.provider().remaining())
    }

    fn next_key(&self) -> Result<Option<String>, LoadError> {
        match &self.keys {
            Some(source) => source.provider().next(),
            None => Err(LoadError::illegal_state(format!(
                "{}: no key provider",
                self.name
            ))),
        }
    }
}

/// Random alphanumeric text used for synthetic values and payloads
pub(crate) fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn require_cache_service(strategy: &str, service: &ServiceConfig) -> Result<(), LoadError> {
    match service {
        ServiceConfig::Cache(_) => Ok(()),
        other => Err(LoadError::config(
            "service.type",
            format!("strategy '{}' needs a cache service, got {}", strategy, other.kind()),
        )),
    }
}

pub type StrategyConstructor = fn() -> Box<dyn LoadStrategy>;

/// Maps strategy names to constructors
pub struct StrategyRegistry {
    constructors: BTreeMap<&'static str, StrategyConstructor>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(WriteThenRead::NAME, || Box::new(WriteThenRead::new()));
        registry.register(ReadThenWriteOnMiss::NAME, || {
            Box::new(ReadThenWriteOnMiss::new())
        });
        registry.register(DeleteStrategy::NAME, || Box::new(DeleteStrategy::new()));
        registry.register(SendStrategy::NAME, || Box::new(SendStrategy::new()));
        registry.register(ReceiveStrategy::NAME, || Box::new(ReceiveStrategy::new()));
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: StrategyConstructor) {
        if self.constructors.insert(name, constructor).is_some() {
            tracing::debug!(strategy = name, "Replacing registered strategy");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn LoadStrategy>, LoadError> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            LoadError::config(
                "strategy.name",
                format!("unknown strategy '{}' (known: {})", name, self.names().join(", ")),
            )
        })?;
        Ok(constructor())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheServiceConfig;

    #[test]
    fn test_lifecycle_transitions() {
        let mut lifecycle = Lifecycle::Uninitialized;
        assert!(lifecycle.require_running("t").is_err());
        assert!(lifecycle.start("t").is_err());
        lifecycle.init("t").unwrap();
        assert!(matches!(lifecycle.init("t"), Err(LoadError::IllegalState(_))));
        lifecycle.start("t").unwrap();
        assert!(lifecycle.require_running("t").is_ok());
    }

    #[test]
    fn test_registry_knows_builtins() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "delete",
                "read-then-write-on-miss",
                "receive",
                "send",
                "write-then-read"
            ]
        );
        let strategy = registry.create("delete").unwrap();
        assert_eq!(strategy.name(), "delete");
    }

    #[test]
    fn test_unknown_strategy_is_config_error() {
        let registry = StrategyRegistry::with_builtins();
        match registry.create("bulk-load") {
            Err(LoadError::Config { option, reason }) => {
                assert_eq!(option, "strategy.name");
                assert!(reason.contains("bulk-load"));
            }
            _ => panic!("expected config error"),
        }
    }

    #[test]
    fn test_every_builtin_rejects_double_init() {
        let registry = StrategyRegistry::with_builtins();
        for name in ["write-then-read", "read-then-write-on-miss"] {
            let mut strategy = registry.create(name).unwrap();
            let service = ServiceConfig::Cache(CacheServiceConfig::default());
            let config = StrategyConfig::named(name);
            strategy.init(&service, &config).unwrap();
            assert!(matches!(
                strategy.init(&service, &config),
                Err(LoadError::IllegalState(_))
            ));
        }
    }

    #[test]
    fn test_random_text_length() {
        let text = random_text(17);
        assert_eq!(text.len(), 17);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
