//! Key sources feeding the load strategies.
//!
//! A [`KeyProvider`] has an explicit start/stop lifecycle and yields keys until
//! its key space is exhausted (`Ok(None)`). Unbounded providers never exhaust.
//! Providers are `Send + Sync` so one instance can either be owned by a single
//! strategy or shared between workers behind an `Arc`.

mod list;
mod random;
mod store;

pub use list::ListKeyProvider;
pub use random::RandomKeyProvider;
pub use store::InMemoryKeyStore;

use crate::error::LoadError;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait KeyProvider: Send + Sync {
    fn start(&self) -> Result<(), LoadError>;

    fn stop(&self) -> Result<(), LoadError>;

    fn is_started(&self) -> bool;

    /// Next key, or `None` once a bounded key space is exhausted.
    ///
    /// Fails with [`LoadError::IllegalState`] if the provider is not started.
    fn next(&self) -> Result<Option<String>, LoadError>;

    /// Remaining keys, `None` for unbounded providers
    fn remaining(&self) -> Option<u64> {
        None
    }
}

/// A key provider that also accepts keys written during the run
pub trait KeyStore: KeyProvider {
    fn store(&self, key: &str, value: Option<&str>) -> Result<(), LoadError>;
}

/// Started/stopped flag shared by the provider implementations
#[derive(Debug, Default)]
pub(crate) struct StartFlag(AtomicBool);

impl StartFlag {
    pub(crate) fn set(&self, started: bool) {
        self.0.store(started, Ordering::Release);
    }

    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn require(&self, what: &str) -> Result<(), LoadError> {
        if self.get() {
            Ok(())
        } else {
            Err(LoadError::illegal_state(format!("{} is not started", what)))
        }
    }
}
