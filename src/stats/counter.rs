use crate::error::LoadError;
use crate::failure::FailureKind;
use crate::operation::OperationType;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Count and cumulative duration of one failure kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureValues {
    pub count: u64,
    pub duration_nanos: u64,
}

/// Snapshot taken by [`Counter::get_and_reset`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterValues {
    pub success_count: u64,
    pub success_duration_nanos: u64,
    pub failures: BTreeMap<FailureKind, FailureValues>,
}

impl CounterValues {
    pub fn failure(&self, kind: FailureKind) -> FailureValues {
        self.failures.get(&kind).copied().unwrap_or_default()
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.values().map(|f| f.count).sum()
    }

    pub fn total_count(&self) -> u64 {
        self.success_count + self.failure_count()
    }

    /// Mean duration of successful operations, `None` without successes
    pub fn average_success_nanos(&self) -> Option<u64> {
        (self.success_count > 0).then(|| self.success_duration_nanos / self.success_count)
    }
}

#[derive(Debug, Default)]
struct FailureCell {
    count: AtomicU64,
    duration_nanos: AtomicU64,
}

/// Lock-free accumulator shared by every worker issuing one operation type.
///
/// Success count and duration are plain atomics. Failure kinds live in a
/// concurrent map that only grows: a reset zeroes each entry in place, so a
/// kind seen once stays visible with zero values in later snapshots.
#[derive(Debug)]
pub struct Counter {
    operation: OperationType,
    success_count: AtomicU64,
    success_duration_nanos: AtomicU64,
    failures: DashMap<FailureKind, FailureCell>,
}

impl Counter {
    pub fn new(operation: OperationType) -> Self {
        Self {
            operation,
            success_count: AtomicU64::new(0),
            success_duration_nanos: AtomicU64::new(0),
            failures: DashMap::new(),
        }
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Records one completed operation.
    ///
    /// An empty `failures` slice records a success. Fails if more than one
    /// failure is given or if `end_nanos < start_nanos`.
    pub fn update(
        &self,
        start_nanos: u64,
        end_nanos: u64,
        failures: &[FailureKind],
    ) -> Result<(), LoadError> {
        if end_nanos < start_nanos {
            return Err(LoadError::invalid_argument(format!(
                "operation ended ({}) before it started ({})",
                end_nanos, start_nanos
            )));
        }
        if failures.len() > 1 {
            return Err(LoadError::invalid_argument(format!(
                "at most one failure per operation, got {}",
                failures.len()
            )));
        }
        let duration = end_nanos - start_nanos;
        match failures.first() {
            None => {
                self.success_count.fetch_add(1, Ordering::Relaxed);
                self.success_duration_nanos
                    .fetch_add(duration, Ordering::Relaxed);
            }
            Some(kind) => self.record_failure(*kind, duration),
        }
        Ok(())
    }

    fn record_failure(&self, kind: FailureKind, duration: u64) {
        if let Some(cell) = self.failures.get(&kind) {
            cell.count.fetch_add(1, Ordering::Relaxed);
            cell.duration_nanos.fetch_add(duration, Ordering::Relaxed);
            return;
        }
        let cell = self.failures.entry(kind).or_default();
        cell.count.fetch_add(1, Ordering::Relaxed);
        cell.duration_nanos.fetch_add(duration, Ordering::Relaxed);
    }

    /// Reads and zeroes all values.
    ///
    /// Each value is swapped atomically, the snapshot as a whole is not: an
    /// update racing with the reset may have its count in this snapshot and its
    /// duration in the next one, and a failure kind first seen during the
    /// reset may only show up one cycle later.
    pub fn get_and_reset(&self) -> CounterValues {
        let success_count = self.success_count.swap(0, Ordering::AcqRel);
        let success_duration_nanos = self.success_duration_nanos.swap(0, Ordering::AcqRel);
        let failures = self
            .failures
            .iter()
            .map(|entry| {
                let values = FailureValues {
                    count: entry.value().count.swap(0, Ordering::AcqRel),
                    duration_nanos: entry.value().duration_nanos.swap(0, Ordering::AcqRel),
                };
                (*entry.key(), values)
            })
            .collect();
        CounterValues {
            success_count,
            success_duration_nanos,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_success_accumulates() {
        let counter = Counter::new(OperationType::Read);
        counter.update(10, 15, &[]).unwrap();
        counter.update(20, 40, &[]).unwrap();
        counter.update(7, 7, &[]).unwrap();
        let values = counter.get_and_reset();
        assert_eq!(values.success_count, 3);
        assert_eq!(values.success_duration_nanos, 25);
        assert!(values.failures.is_empty());
        assert_eq!(values.average_success_nanos(), Some(8));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let counter = Counter::new(OperationType::Write);
        let err = counter.update(10, 9, &[]).unwrap_err();
        assert!(matches!(err, LoadError::InvalidArgument(_)));
        assert_eq!(counter.get_and_reset().success_count, 0);
    }

    #[test]
    fn test_more_than_one_failure_rejected() {
        let counter = Counter::new(OperationType::Write);
        let result = counter.update(
            0,
            1,
            &[FailureKind::Timeout, FailureKind::ConnectionRefused],
        );
        assert!(matches!(result, Err(LoadError::InvalidArgument(_))));
        assert_eq!(counter.get_and_reset().total_count(), 0);
    }

    #[test]
    fn test_failure_kinds_survive_reset_with_zero() {
        let counter = Counter::new(OperationType::Read);
        counter.update(0, 5, &[FailureKind::Timeout]).unwrap();
        counter.update(0, 7, &[FailureKind::Timeout]).unwrap();
        counter.update(0, 1, &[FailureKind::BrokenPipe]).unwrap();

        let first = counter.get_and_reset();
        assert_eq!(
            first.failure(FailureKind::Timeout),
            FailureValues {
                count: 2,
                duration_nanos: 12
            }
        );
        assert_eq!(first.failure(FailureKind::BrokenPipe).count, 1);
        assert_eq!(first.success_count, 0);

        let second = counter.get_and_reset();
        assert_eq!(second.failures.len(), 2);
        assert_eq!(second.failure_count(), 0);
        assert!(second.failures.contains_key(&FailureKind::Timeout));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let counter = Arc::new(Counter::new(OperationType::Write));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for i in 0..10_000u64 {
                        if i % 10 == 0 {
                            counter.update(i, i + 2, &[FailureKind::Other]).unwrap();
                        } else {
                            counter.update(i, i + t, &[]).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let values = counter.get_and_reset();
        assert_eq!(values.success_count, 8 * 9_000);
        assert_eq!(values.failure(FailureKind::Other).count, 8 * 1_000);
        assert_eq!(values.failure(FailureKind::Other).duration_nanos, 8 * 1_000 * 2);
        // thread t adds t per success
        let expected: u64 = (0..8u64).map(|t| t * 9_000).sum();
        assert_eq!(values.success_duration_nanos, expected);
    }
}
