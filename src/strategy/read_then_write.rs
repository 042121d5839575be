use super::{random_text, require_cache_service, LoadStrategy, StrategyCore};
use crate::config::{ServiceConfig, StrategyConfig};
use crate::error::LoadError;
use crate::key::{KeyProvider, RandomKeyProvider};
use crate::operation::{Operation, OperationType};
use std::sync::Arc;

/// Reads fresh keys and writes back every key the read missed.
///
/// The decision only looks at the operation this worker performed last, so
/// instances on different workers may share one key store.
pub struct ReadThenWriteOnMiss {
    core: StrategyCore,
    value: String,
}

impl ReadThenWriteOnMiss {
    pub const NAME: &'static str = "read-then-write-on-miss";

    pub fn new() -> Self {
        Self {
            core: StrategyCore::new(Self::NAME),
            value: String::new(),
        }
    }
}

impl Default for ReadThenWriteOnMiss {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStrategy for ReadThenWriteOnMiss {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig) -> Result<(), LoadError> {
        require_cache_service(Self::NAME, service)?;
        self.core.init_keys(|| {
            let provider = RandomKeyProvider::new(config.key_size, config.key_count)?;
            Ok(Some(Box::new(provider) as Box<dyn KeyProvider>))
        })?;
        self.value = random_text(config.value_size);
        Ok(())
    }

    fn start(&mut self) -> Result<(), LoadError> {
        self.core.start()
    }

    fn stop(&mut self) -> Result<(), LoadError> {
        self.core.stop()
    }

    fn is_started(&self) -> bool {
        self.core.is_started()
    }

    fn operation_types(&self) -> Vec<OperationType> {
        vec![OperationType::Read, OperationType::Write]
    }

    fn next(
        &mut self,
        last: Option<&Operation>,
        _last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError> {
        self.core.require_running()?;
        if shutting_down {
            return Ok(None);
        }
        if let Some(last) = last {
            if last.operation_type() == OperationType::Read && last.outcome().is_miss() {
                if let Some(key) = last.key() {
                    return Ok(Some(Operation::write(key, self.value.as_str())));
                }
            }
        }
        Ok(self.core.next_key()?.map(Operation::read))
    }

    fn attach_key_provider(&mut self, provider: Arc<dyn KeyProvider>) -> Result<(), LoadError> {
        self.core.attach(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheServiceConfig;
    use crate::key::ListKeyProvider;
    use crate::operation::{OperationKind, Outcome};

    fn running(keys: &[&str]) -> ReadThenWriteOnMiss {
        let provider = Arc::new(ListKeyProvider::new(keys.iter().copied()));
        provider.start().unwrap();
        let mut strategy = ReadThenWriteOnMiss::new();
        strategy.attach_key_provider(provider).unwrap();
        let mut config = StrategyConfig::named(ReadThenWriteOnMiss::NAME);
        config.value_size = 4;
        strategy
            .init(&ServiceConfig::Cache(CacheServiceConfig::default()), &config)
            .unwrap();
        strategy.start().unwrap();
        strategy
    }

    #[test]
    fn test_always_missing_alternates_read_and_write() {
        let mut strategy = running(&["k1", "k2"]);
        let mut last: Option<Operation> = None;
        let mut kinds = Vec::new();
        while let Some(mut op) = strategy.next(last.as_ref(), None, false).unwrap() {
            let found = match op.kind() {
                OperationKind::Read { .. } => Some(false),
                _ => None,
            };
            op.set_outcome(Outcome::success(found, None));
            kinds.push(op.kind().clone());
            last = Some(op);
        }
        let value = strategy.value.clone();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Read { key: "k1".into() },
                OperationKind::Write {
                    key: "k1".into(),
                    value: value.clone()
                },
                OperationKind::Read { key: "k2".into() },
                OperationKind::Write {
                    key: "k2".into(),
                    value
                },
            ]
        );
    }

    #[test]
    fn test_hit_and_failure_move_on_to_next_read() {
        let mut strategy = running(&["k1", "k2", "k3"]);
        let mut hit = strategy.next(None, None, false).unwrap().unwrap();
        hit.set_outcome(Outcome::success(Some(true), Some("v".into())));

        let mut failed = strategy.next(Some(&hit), None, false).unwrap().unwrap();
        assert_eq!(failed.key(), Some("k2"));
        assert_eq!(failed.operation_type(), OperationType::Read);
        failed.set_outcome(Outcome::failure());

        let next = strategy.next(Some(&failed), None, false).unwrap().unwrap();
        assert_eq!(next.key(), Some("k3"));
        assert_eq!(next.operation_type(), OperationType::Read);
    }

    #[test]
    fn test_stops_issuing_when_shutting_down() {
        let mut strategy = running(&["k1"]);
        let mut miss = strategy.next(None, None, false).unwrap().unwrap();
        miss.set_outcome(Outcome::success(Some(false), None));
        assert!(strategy.next(Some(&miss), None, true).unwrap().is_none());
    }
}
