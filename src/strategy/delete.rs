use super::{require_cache_service, LoadStrategy, StrategyCore};
use crate::config::{ServiceConfig, StrategyConfig};
use crate::constants::DEFAULT_DELETE_KEY_COUNT;
use crate::error::LoadError;
use crate::key::{KeyProvider, ListKeyProvider};
use crate::operation::{Operation, OperationType};
use std::sync::Arc;

/// Deletes keys from an explicit key set or a shared key store.
///
/// At most `key_count` deletes are issued, one unless configured otherwise.
pub struct DeleteStrategy {
    core: StrategyCore,
    limit: u64,
    issued: u64,
}

impl DeleteStrategy {
    pub const NAME: &'static str = "delete";

    pub fn new() -> Self {
        Self {
            core: StrategyCore::new(Self::NAME),
            limit: DEFAULT_DELETE_KEY_COUNT,
            issued: 0,
        }
    }

    /// Deletes that cannot be issued with the keys available right now
    fn shortfall(&self) -> Option<u64> {
        let available = self.core.remaining_keys()?;
        (available < self.limit).then(|| self.limit - available)
    }
}

impl Default for DeleteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStrategy for DeleteStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig) -> Result<(), LoadError> {
        require_cache_service(Self::NAME, service)?;
        let limit = config.key_count.unwrap_or(DEFAULT_DELETE_KEY_COUNT);
        if limit == 0 {
            return Err(LoadError::config("strategy.key_count", "must be greater than 0"));
        }
        self.core.init_keys(|| {
            if config.keys.is_empty() {
                return Err(LoadError::config(
                    "strategy.keys",
                    "delete needs an explicit key set or use_key_store",
                ));
            }
            let provider = ListKeyProvider::new(config.keys.iter().cloned());
            Ok(Some(Box::new(provider) as Box<dyn KeyProvider>))
        })?;
        self.limit = limit;
        Ok(())
    }

    fn start(&mut self) -> Result<(), LoadError> {
        self.core.start()?;
        if let Some(missing) = self.shortfall() {
            tracing::warn!(
                key_count = self.limit,
                missing,
                "Fewer keys available than deletes requested"
            );
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), LoadError> {
        self.core.stop()
    }

    fn is_started(&self) -> bool {
        self.core.is_started()
    }

    fn operation_types(&self) -> Vec<OperationType> {
        vec![OperationType::Delete]
    }

    fn next(
        &mut self,
        _last: Option<&Operation>,
        _last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError> {
        self.core.require_running()?;
        if shutting_down || self.issued >= self.limit {
            return Ok(None);
        }
        let operation = self.core.next_key()?.map(Operation::delete);
        if operation.is_some() {
            self.issued += 1;
        }
        Ok(operation)
    }

    fn attach_key_provider(&mut self, provider: Arc<dyn KeyProvider>) -> Result<(), LoadError> {
        self.core.attach(provider)
    }
}
