use super::{KeyProvider, StartFlag};
use crate::error::LoadError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates random alphanumeric keys of a fixed size.
///
/// With a key count the provider is bounded and returns `None` after that
/// many keys; without one it never exhausts.
#[derive(Debug)]
pub struct RandomKeyProvider {
    key_size: usize,
    key_count: Option<u64>,
    issued: AtomicU64,
    started: StartFlag,
}

impl RandomKeyProvider {
    pub fn new(key_size: usize, key_count: Option<u64>) -> Result<Self, LoadError> {
        if key_size == 0 {
            return Err(LoadError::config("key_size", "must be greater than 0"));
        }
        Ok(Self {
            key_size,
            key_count,
            issued: AtomicU64::new(0),
            started: StartFlag::default(),
        })
    }

    pub fn unbounded(key_size: usize) -> Result<Self, LoadError> {
        Self::new(key_size, None)
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    fn claim(&self) -> bool {
        match self.key_count {
            None => true,
            Some(limit) => self
                .issued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |issued| {
                    (issued < limit).then_some(issued + 1)
                })
                .is_ok(),
        }
    }
}

impl KeyProvider for RandomKeyProvider {
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
        self.started.require("random key provider")?;
        if !self.claim() {
            return Ok(None);
        }
        let key = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.key_size)
            .map(char::from)
            .collect();
        Ok(Some(key))
    }

    fn remaining(&self) -> Option<u64> {
        self.key_count
            .map(|limit| limit.saturating_sub(self.issued.load(Ordering::Acquire)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size_respected() {
        let provider = RandomKeyProvider::unbounded(12).unwrap();
        provider.start().unwrap();
        for _ in 0..100 {
            let key = provider.next().unwrap().unwrap();
            assert_eq!(key.len(), 12);
            assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert_eq!(provider.remaining(), None);
    }

    #[test]
    fn test_bounded_exhausts() {
        let provider = RandomKeyProvider::new(4, Some(3)).unwrap();
        provider.start().unwrap();
        assert!(provider.next().unwrap().is_some());
        assert!(provider.next().unwrap().is_some());
        assert!(provider.next().unwrap().is_some());
        assert_eq!(provider.remaining(), Some(0));
        assert!(provider.next().unwrap().is_none());
        assert!(provider.next().unwrap().is_none());
    }

    #[test]
    fn test_next_requires_start() {
        let provider = RandomKeyProvider::unbounded(8).unwrap();
        assert!(matches!(provider.next(), Err(LoadError::IllegalState(_))));
        provider.start().unwrap();
        provider.stop().unwrap();
        assert!(matches!(provider.next(), Err(LoadError::IllegalState(_))));
    }

    #[test]
    fn test_zero_key_size_rejected() {
        assert!(matches!(
            RandomKeyProvider::new(0, None),
            Err(LoadError::Config { .. })
        ));
    }

    #[test]
    fn test_bounded_across_threads() {
        let provider = std::sync::Arc::new(RandomKeyProvider::new(6, Some(1000)).unwrap());
        provider.start().unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let provider = provider.clone();
                std::thread::spawn(move || {
                    let mut n = 0;
                    while provider.next().unwrap().is_some() {
                        n += 1;
                    }
                    n
                })
            })
            .collect();
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1000);
    }
}
