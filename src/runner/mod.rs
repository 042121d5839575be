//! Multi-threaded execution of load strategies against a shared service.

mod coordinator;
mod signal;
mod worker;

pub use coordinator::{Runner, RunnerBuilder, StrategyFactory};
pub use signal::{install_signal_handler, request_shutdown};
pub use worker::{Worker, WorkerBuilder};

use crate::config::LoadConfiguration;
use crate::failure::FailureKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Runner settings taken from the load configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub threads: usize,
    /// Fixed delay between two operations of one worker
    pub sleep: Option<Duration>,
    /// Run length; the shutdown flag is set once it elapses
    pub duration: Option<Duration>,
}

impl RunnerConfig {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            sleep: None,
            duration: None,
        }
    }
}

impl From<&LoadConfiguration> for RunnerConfig {
    fn from(config: &LoadConfiguration) -> Self {
        Self {
            threads: config.threads,
            sleep: config.sleep(),
            duration: config.duration(),
        }
    }
}

/// What one worker did before it exited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker: String,
    pub operations: u64,
    pub successes: u64,
    pub failures: BTreeMap<FailureKind, u64>,
}

impl WorkerReport {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, failure: Option<FailureKind>) {
        self.operations += 1;
        match failure {
            None => self.successes += 1,
            Some(kind) => *self.failures.entry(kind).or_default() += 1,
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.values().sum()
    }
}

/// Totals over all workers of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workers: usize,
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    pub elapsed_ms: u64,
    pub intervals_emitted: u64,
}

impl RunSummary {
    pub fn from_reports(reports: &[WorkerReport], elapsed: Duration, intervals_emitted: u64) -> Self {
        let mut failures_by_kind = BTreeMap::new();
        for report in reports {
            for (kind, count) in &report.failures {
                *failures_by_kind.entry(*kind).or_insert(0) += count;
            }
        }
        let successful_operations = reports.iter().map(|r| r.successes).sum();
        let failed_operations = failures_by_kind.values().sum();
        Self {
            workers: reports.len(),
            total_operations: reports.iter().map(|r| r.operations).sum(),
            successful_operations,
            failed_operations,
            failures_by_kind,
            elapsed_ms: elapsed.as_millis() as u64,
            intervals_emitted,
        }
    }

    pub fn throughput_ops_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            0.0
        } else {
            self.total_operations as f64 / (self.elapsed_ms as f64 / 1000.0)
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.successful_operations as f64 / self.total_operations as f64) * 100.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            100.0 - self.success_rate()
        }
    }
}
