//! Operation model for load generation.
//!
//! An [`Operation`] is created by a load strategy, executed exactly once by a
//! worker against a [`Service`], and afterwards only its [`Outcome`] changes.
//! Execution dispatches on [`OperationKind`] to the capability the service
//! exposes for that kind of traffic.

use crate::error::ServiceError;
use crate::service::{Service, WorkerContext};
use serde::{Deserialize, Serialize};

/// Operation category, one statistics counter per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Read,
    Write,
    Delete,
    Send,
    Receive,
    CloseSession,
}

impl OperationType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::CloseSession => "close-session",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do, with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Read {
        key: String,
    },
    Write {
        key: String,
        value: String,
    },
    Delete {
        key: String,
    },
    Send {
        destination: String,
        message_id: String,
        payload: String,
    },
    Receive {
        destination: String,
    },
    /// Releases the per-worker session held by a messaging service
    CloseSession,
}

impl OperationKind {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Read { .. } => OperationType::Read,
            Self::Write { .. } => OperationType::Write,
            Self::Delete { .. } => OperationType::Delete,
            Self::Send { .. } => OperationType::Send,
            Self::Receive { .. } => OperationType::Receive,
            Self::CloseSession => OperationType::CloseSession,
        }
    }
}

/// Result flags, filled in by [`Operation::perform`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub performed: bool,
    pub successful: bool,
    /// For reads, deletes and receives: whether the target existed
    pub found: Option<bool>,
    /// Value returned by a read or payload returned by a receive
    pub value: Option<String>,
}

impl Outcome {
    pub fn success(found: Option<bool>, value: Option<String>) -> Self {
        Self {
            performed: true,
            successful: true,
            found,
            value,
        }
    }

    pub fn failure() -> Self {
        Self {
            performed: true,
            successful: false,
            found: None,
            value: None,
        }
    }

    /// Performed, successful and found nothing
    pub fn is_miss(&self) -> bool {
        self.performed && self.successful && self.found == Some(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    kind: OperationKind,
    outcome: Outcome,
    cleanup: bool,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            outcome: Outcome::default(),
            cleanup: false,
        }
    }

    pub fn read(key: impl Into<String>) -> Self {
        Self::new(OperationKind::Read { key: key.into() })
    }

    pub fn write(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(OperationKind::Write {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete { key: key.into() })
    }

    pub fn send(
        destination: impl Into<String>,
        message_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(OperationKind::Send {
            destination: destination.into(),
            message_id: message_id.into(),
            payload: payload.into(),
        })
    }

    pub fn receive(destination: impl Into<String>) -> Self {
        Self::new(OperationKind::Receive {
            destination: destination.into(),
        })
    }

    /// The last operation a strategy issues once the run is shutting down
    pub fn cleanup(kind: OperationKind) -> Self {
        Self {
            kind,
            outcome: Outcome::default(),
            cleanup: true,
        }
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn operation_type(&self) -> OperationType {
        self.kind.operation_type()
    }

    /// Key for cache operations, message id for sends
    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Read { key }
            | OperationKind::Write { key, .. }
            | OperationKind::Delete { key } => Some(key),
            OperationKind::Send { message_id, .. } => Some(message_id),
            OperationKind::Receive { .. } | OperationKind::CloseSession => None,
        }
    }

    /// Value carried by a write
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Write { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_cleanup(&self) -> bool {
        self.cleanup
    }

    /// Overrides the result flags, for services that execute operations
    /// through their own path
    pub fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }

    /// Executes the operation against `service` through the capability its
    /// kind requires. The outcome is recorded whether or not the call fails.
    pub fn perform(
        &mut self,
        service: &dyn Service,
        ctx: &mut WorkerContext,
    ) -> Result<(), ServiceError> {
        if self.outcome.performed {
            return Err(ServiceError::backend("operation already performed"));
        }
        match self.dispatch(service, ctx) {
            Ok(outcome) => {
                self.outcome = outcome;
                Ok(())
            }
            Err(e) => {
                self.outcome = Outcome::failure();
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        service: &dyn Service,
        ctx: &mut WorkerContext,
    ) -> Result<Outcome, ServiceError> {
        match &self.kind {
            OperationKind::Read { key } => {
                let value = require_cache(service)?.get(key)?;
                Ok(Outcome::success(Some(value.is_some()), value))
            }
            OperationKind::Write { key, value } => {
                require_cache(service)?.put(key, value)?;
                Ok(Outcome::success(None, None))
            }
            OperationKind::Delete { key } => {
                let existed = require_cache(service)?.remove(key)?;
                Ok(Outcome::success(Some(existed), None))
            }
            OperationKind::Send {
                destination,
                payload,
                ..
            } => {
                require_messaging(service)?.send(ctx, destination, payload)?;
                Ok(Outcome::success(None, None))
            }
            OperationKind::Receive { destination } => {
                let message = require_messaging(service)?.receive(ctx, destination)?;
                Ok(Outcome::success(Some(message.is_some()), message))
            }
            OperationKind::CloseSession => {
                require_messaging(service)?.close_session(ctx)?;
                Ok(Outcome::success(None, None))
            }
        }
    }
}

fn require_cache(service: &dyn Service) -> Result<&dyn crate::service::CacheService, ServiceError> {
    service.cache().ok_or_else(|| {
        ServiceError::Unsupported(format!("{} does not support cache operations", service.name()))
    })
}

fn require_messaging(
    service: &dyn Service,
) -> Result<&dyn crate::service::MessagingService, ServiceError> {
    service.messaging().ok_or_else(|| {
        ServiceError::Unsupported(format!(
            "{} does not support messaging operations",
            service.name()
        ))
    })
}
