use super::{KeyProvider, KeyStore, StartFlag};
use crate::error::LoadError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct Entries {
    pending: VecDeque<String>,
    values: HashMap<String, Option<String>>,
}

/// Thread-safe key store shared between workers.
///
/// Keys written during a run are recorded and served back first-in first-out.
/// With a capacity, keys beyond it are dropped rather than stored.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    entries: Mutex<Entries>,
    capacity: Option<usize>,
    started: StartFlag,
}

impl InMemoryKeyStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity,
            started: StartFlag::default(),
        }
    }

    /// Store pre-populated with keys, e.g. a key set captured by an earlier run
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::preloaded(None, keys)
    }

    /// Bounded store holding `keys` up front; keys beyond the capacity are dropped
    pub fn preloaded<I, S>(capacity: Option<usize>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new(capacity);
        {
            let mut entries = store.entries.lock();
            let limit = capacity.unwrap_or(usize::MAX);
            for key in keys {
                if entries.pending.len() >= limit {
                    break;
                }
                let key = key.into();
                if entries.values.insert(key.clone(), None).is_none() {
                    entries.pending.push_back(key);
                }
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value recorded with the key, if the key was stored with one
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.entries.lock().values.get(key).cloned().flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().values.contains_key(key)
    }
}

impl KeyProvider for InMemoryKeyStore {
    fn start(&self) -> Result<(), LoadError> {
        self.started.set(true);
        Ok(())
    }

    fn stop(&self) -> Result<(), LoadError> {
        self.started.set(false);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.get()
    }

    fn next(&self) -> Result<Option<String>, LoadError> {
        self.started.require("key store")?;
        let mut entries = self.entries.lock();
        let key = entries.pending.pop_front();
        if let Some(ref key) = key {
            entries.values.remove(key);
        }
        Ok(key)
    }

    fn remaining(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl KeyStore for InMemoryKeyStore {
    fn store(&self, key: &str, value: Option<&str>) -> Result<(), LoadError> {
        self.started.require("key store")?;
        let mut entries = self.entries.lock();
        if entries.values.contains_key(key) {
            entries
                .values
                .insert(key.to_string(), value.map(str::to_string));
            return Ok(());
        }
        if let Some(capacity) = self.capacity {
            if entries.pending.len() >= capacity {
                tracing::trace!(key, capacity, "Key store full, dropping key");
                return Ok(());
            }
        }
        entries
            .values
            .insert(key.to_string(), value.map(str::to_string));
        entries.pending.push_back(key.to_string());
        Ok(())
    }
}
