//! Broker traffic: one strategy sends, the other receives.
//!
//! Both hold a session on the broker through the worker context. When the
//! run shuts down or the message budget runs out they issue exactly one
//! session close before returning `None`.

use super::{random_text, LoadStrategy, StrategyCore};
use crate::config::{ServiceConfig, StrategyConfig};
use crate::error::LoadError;
use crate::key::{KeyProvider, RandomKeyProvider};
use crate::operation::{Operation, OperationKind, OperationType};

fn resolve_destination(
    strategy: &str,
    service: &ServiceConfig,
    config: &StrategyConfig,
) -> Result<String, LoadError> {
    match service {
        ServiceConfig::Messaging(messaging) => Ok(config
            .destination
            .clone()
            .unwrap_or_else(|| messaging.destination.clone())),
        other => Err(LoadError::config(
            "service.type",
            format!(
                "strategy '{}' needs a messaging service, got {}",
                strategy,
                other.kind()
            ),
        )),
    }
}

/// Tracks whether the closing operation went out
#[derive(Debug, Default)]
struct SessionClose {
    issued: bool,
}

impl SessionClose {
    fn take(&mut self) -> Option<Operation> {
        if self.issued {
            return None;
        }
        self.issued = true;
        Some(Operation::cleanup(OperationKind::CloseSession))
    }
}

/// Sends random payloads to one destination, each with a fresh message id
pub struct SendStrategy {
    core: StrategyCore,
    destination: String,
    payload: String,
    close: SessionClose,
}

impl SendStrategy {
    pub const NAME: &'static str = "send";

    pub fn new() -> Self {
        Self {
            core: StrategyCore::new(Self::NAME),
            destination: String::new(),
            payload: String::new(),
            close: SessionClose::default(),
        }
    }
}

impl Default for SendStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStrategy for SendStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig) -> Result<(), LoadError> {
        let destination = resolve_destination(Self::NAME, service, config)?;
        self.core.init_keys(|| {
            let ids = RandomKeyProvider::new(config.key_size, config.key_count)?;
            Ok(Some(Box::new(ids) as Box<dyn KeyProvider>))
        })?;
        self.destination = destination;
        self.payload = random_text(config.message_size);
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
        vec![OperationType::Send, OperationType::CloseSession]
    }

    fn next(
        &mut self,
        _last: Option<&Operation>,
        _last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError> {
        self.core.require_running()?;
        if shutting_down || self.close.issued {
            return Ok(self.close.take());
        }
        match self.core.next_key()? {
            Some(id) => Ok(Some(Operation::send(
                self.destination.as_str(),
                id,
                self.payload.as_str(),
            ))),
            None => Ok(self.close.take()),
        }
    }
}

/// Receives from one destination, optionally bounded by a message count
pub struct ReceiveStrategy {
    core: StrategyCore,
    destination: String,
    limit: Option<u64>,
    issued: u64,
    close: SessionClose,
}

impl ReceiveStrategy {
    pub const NAME: &'static str = "receive";

    pub fn new() -> Self {
        Self {
            core: StrategyCore::new(Self::NAME),
            destination: String::new(),
            limit: None,
            issued: 0,
            close: SessionClose::default(),
        }
    }
}

impl Default for ReceiveStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStrategy for ReceiveStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig) -> Result<(), LoadError> {
        let destination = resolve_destination(Self::NAME, service, config)?;
        // receives carry no key
        self.core.init_keys(|| Ok(None))?;
        self.destination = destination;
        self.limit = config.key_count;
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
        vec![OperationType::Receive, OperationType::CloseSession]
    }

    fn next(
        &mut self,
        _last: Option<&Operation>,
        _last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError> {
        self.core.require_running()?;
        let exhausted = self.limit.is_some_and(|limit| self.issued >= limit);
        if shutting_down || exhausted || self.close.issued {
            return Ok(self.close.take());
        }
        self.issued += 1;
        Ok(Some(Operation::receive(self.destination.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheServiceConfig, MessagingServiceConfig};

    fn broker() -> ServiceConfig {
        ServiceConfig::Messaging(MessagingServiceConfig {
            destination: "orders".to_string(),
            ..Default::default()
        })
    }

    fn started(mut strategy: Box<dyn LoadStrategy>, config: StrategyConfig) -> Box<dyn LoadStrategy> {
        strategy.init(&broker(), &config).unwrap();
        strategy.start().unwrap();
        strategy
    }

    #[test]
    fn test_send_uses_service_destination_and_fresh_ids() {
        let mut config = StrategyConfig::named(SendStrategy::NAME);
        config.message_size = 16;
        let mut strategy = started(Box::new(SendStrategy::new()), config);

        let first = strategy.next(None, None, false).unwrap().unwrap();
        let second = strategy.next(Some(&first), None, false).unwrap().unwrap();
        match first.kind() {
            OperationKind::Send {
                destination,
                payload,
                ..
            } => {
                assert_eq!(destination, "orders");
                assert_eq!(payload.len(), 16);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_ne!(first.key(), second.key());
    }

    #[test]
    fn test_send_closes_once_on_shutdown() {
        let mut strategy = started(
            Box::new(SendStrategy::new()),
            StrategyConfig::named(SendStrategy::NAME),
        );
        let close = strategy.next(None, None, true).unwrap().unwrap();
        assert!(close.is_cleanup());
        assert_eq!(close.operation_type(), OperationType::CloseSession);
        assert!(strategy.next(Some(&close), None, true).unwrap().is_none());
        assert!(strategy.next(None, None, false).unwrap().is_none());
    }

    #[test]
    fn test_send_closes_once_when_budget_exhausted() {
        let mut config = StrategyConfig::named(SendStrategy::NAME);
        config.key_count = Some(2);
        let mut strategy = started(Box::new(SendStrategy::new()), config);
        let types: Vec<_> = std::iter::from_fn(|| strategy.next(None, None, false).unwrap())
            .map(|op| op.operation_type())
            .collect();
        assert_eq!(
            types,
            vec![
                OperationType::Send,
                OperationType::Send,
                OperationType::CloseSession
            ]
        );
    }

    #[test]
    fn test_receive_explicit_destination_and_bound() {
        let mut config = StrategyConfig::named(ReceiveStrategy::NAME);
        config.destination = Some("audit".to_string());
        config.key_count = Some(1);
        let mut strategy = started(Box::new(ReceiveStrategy::new()), config);

        let receive = strategy.next(None, None, false).unwrap().unwrap();
        assert_eq!(
            receive.kind(),
            &OperationKind::Receive {
                destination: "audit".to_string()
            }
        );
        assert!(strategy.next(None, None, false).unwrap().unwrap().is_cleanup());
        assert!(strategy.next(None, None, false).unwrap().is_none());
    }

    #[test]
    fn test_cache_service_rejected() {
        let mut strategy = ReceiveStrategy::new();
        let err = strategy
            .init(
                &ServiceConfig::Cache(CacheServiceConfig::default()),
                &StrategyConfig::named(ReceiveStrategy::NAME),
            )
            .unwrap_err();
        assert!(matches!(err, LoadError::Config { .. }));
    }
}
