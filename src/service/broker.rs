use super::{Faults, MessagingService, Service, WorkerContext};
use crate::config::ServiceConfig;
use crate::error::{LoadError, ServiceError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Process-local message broker with named queues and per-worker sessions.
///
/// A session is opened lazily on a worker's first send or receive and lives
/// in that worker's [`WorkerContext`] until it is closed.
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    sessions: Mutex<HashSet<u64>>,
    next_session: AtomicU64,
    started: AtomicBool,
    faults: Faults,
}

impl InMemoryBroker {
    pub const NAME: &'static str = "in-memory-broker";

    pub fn new(latency_ms: u64, fail_every: Option<u64>, failure_message: Option<String>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashSet::new()),
            next_session: AtomicU64::new(1),
            started: AtomicBool::new(false),
            faults: Faults::new(latency_ms, fail_every, failure_message),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Arc<dyn Service>, LoadError> {
        match config {
            ServiceConfig::Messaging(messaging) => Ok(Arc::new(Self::new(
                messaging.latency_ms,
                messaging.fail_every,
                messaging.failure_message.clone(),
            ))),
            ServiceConfig::Cache(_) => Err(LoadError::config(
                "service.type",
                format!("{} requires a messaging service configuration", Self::NAME),
            )),
        }
    }

    pub fn depth(&self, destination: &str) -> usize {
        self.queues
            .lock()
            .get(destination)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    fn ensure_session(&self, ctx: &mut WorkerContext) -> Result<u64, ServiceError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(ServiceError::NotStarted(Self::NAME.to_string()));
        }
        if let Some(session) = ctx.session {
            return Ok(session);
        }
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(session);
        tracing::debug!(worker = ctx.worker_id, session, "Opened broker session");
        ctx.session = Some(session);
        Ok(session)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(0, None, None)
    }
}

impl Service for InMemoryBroker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn start(&self) -> Result<(), ServiceError> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.started.store(false, Ordering::Release);
        let leaked = {
            let mut sessions = self.sessions.lock();
            let leaked = sessions.len();
            sessions.clear();
            leaked
        };
        if leaked > 0 {
            tracing::warn!(sessions = leaked, "Broker stopped with open sessions");
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn messaging(&self) -> Option<&dyn MessagingService> {
        Some(self)
    }
}

impl MessagingService for InMemoryBroker {
    fn send(
        &self,
        ctx: &mut WorkerContext,
        destination: &str,
        payload: &str,
    ) -> Result<(), ServiceError> {
        self.ensure_session(ctx)?;
        self.faults.before_call()?;
        self.queues
            .lock()
            .entry(destination.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    fn receive(
        &self,
        ctx: &mut WorkerContext,
        destination: &str,
    ) -> Result<Option<String>, ServiceError> {
        self.ensure_session(ctx)?;
        self.faults.before_call()?;
        Ok(self
            .queues
            .lock()
            .get_mut(destination)
            .and_then(VecDeque::pop_front))
    }

    fn close_session(&self, ctx: &mut WorkerContext) -> Result<(), ServiceError> {
        if let Some(session) = ctx.session.take() {
            self.sessions.lock().remove(&session);
            tracing::debug!(worker = ctx.worker_id, session, "Closed broker session");
        }
        Ok(())
    }
}
