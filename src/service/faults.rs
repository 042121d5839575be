use crate::error::ServiceError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Simulated latency and deterministic failure injection for the in-memory backends
#[derive(Debug)]
pub(crate) struct Faults {
    latency: Option<Duration>,
    fail_every: Option<u64>,
    failure_message: String,
    calls: AtomicU64,
}

impl Faults {
    pub(crate) fn new(latency_ms: u64, fail_every: Option<u64>, failure_message: Option<String>) -> Self {
        Self {
            latency: (latency_ms > 0).then(|| Duration::from_millis(latency_ms)),
            fail_every: fail_every.filter(|n| *n > 0),
            failure_message: failure_message.unwrap_or_else(|| "Connection refused".to_string()),
            calls: AtomicU64::new(0),
        }
    }

    pub(crate) fn none() -> Self {
        Self::new(0, None, None)
    }

    /// Applies the configured latency, then fails every Nth call
    pub(crate) fn before_call(&self) -> Result<(), ServiceError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        match self.fail_every {
            Some(n) if call % n == 0 => Err(ServiceError::backend(self.failure_message.clone())),
            _ => Ok(()),
        }
    }
}
