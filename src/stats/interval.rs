use super::counter::CounterValues;
use super::metrics::MetricReading;
use crate::operation::OperationType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics for the fixed-width window `[start_ms, start_ms + duration_ms)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingInterval {
    pub start_ms: u64,
    pub duration_ms: u64,
    pub counters: BTreeMap<OperationType, CounterValues>,
    /// Point-in-time gauges read when the window was flushed
    pub metrics: Vec<MetricReading>,
    pub annotations: Vec<String>,
}

impl SamplingInterval {
    pub fn new(start_ms: u64, duration_ms: u64) -> Self {
        Self {
            start_ms,
            duration_ms,
            counters: BTreeMap::new(),
            metrics: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    pub fn values(&self, operation: OperationType) -> Option<&CounterValues> {
        self.counters.get(&operation)
    }

    /// Successes per second of nominal window width
    pub fn success_rate(&self, operation: OperationType) -> f64 {
        self.per_second(self.values(operation).map_or(0, |v| v.success_count))
    }

    pub(crate) fn per_second(&self, count: u64) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            count as f64 * 1000.0 / self.duration_ms as f64
        }
    }

    pub fn total_operations(&self) -> u64 {
        self.counters.values().map(CounterValues::total_count).sum()
    }
}
