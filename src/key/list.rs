use super::{KeyProvider, StartFlag};
use crate::error::LoadError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves an externally supplied key set once, in order.
#[derive(Debug)]
pub struct ListKeyProvider {
    keys: Vec<String>,
    cursor: AtomicUsize,
    started: StartFlag,
}

impl ListKeyProvider {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
            started: StartFlag::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyProvider for ListKeyProvider {
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
        self.started.require("list key provider")?;
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        Ok(self.keys.get(index).cloned())
    }

    fn remaining(&self) -> Option<u64> {
        let used = self.cursor.load(Ordering::Acquire).min(self.keys.len());
        Some((self.keys.len() - used) as u64)
    }
}
