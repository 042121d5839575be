use super::WorkerReport;
use crate::clock::monotonic_nanos;
use crate::error::LoadError;
use crate::failure::{FailureClassifier, FailureKind, FingerprintClassifier};
use crate::key::KeyStore;
use crate::operation::{Operation, OperationType, Outcome};
use crate::service::{Service, WorkerContext};
use crate::stats::Sampler;
use crate::strategy::LoadStrategy;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Collects a worker's collaborators; [`WorkerBuilder::build`] fails with
/// [`LoadError::MissingDependency`] if a mandatory one is absent.
#[derive(Default)]
pub struct WorkerBuilder {
    id: usize,
    name: Option<String>,
    service: Option<Arc<dyn Service>>,
    strategy: Option<Box<dyn LoadStrategy>>,
    sampler: Option<Arc<Sampler>>,
    barrier: Option<Arc<Barrier>>,
    shutdown: Option<Arc<AtomicBool>>,
    key_store: Option<Arc<dyn KeyStore>>,
    classifier: Option<Arc<dyn FailureClassifier>>,
    sleep: Option<Duration>,
}

impl WorkerBuilder {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn service(mut self, service: Arc<dyn Service>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn strategy(mut self, strategy: Box<dyn LoadStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn sampler(mut self, sampler: Arc<Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn key_store(mut self, store: Option<Arc<dyn KeyStore>>) -> Self {
        self.key_store = store;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn sleep(mut self, sleep: Option<Duration>) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn build(self) -> Result<Worker, LoadError> {
        Ok(Worker {
            id: self.id,
            name: self.name.ok_or(LoadError::MissingDependency("name"))?,
            service: self.service.ok_or(LoadError::MissingDependency("service"))?,
            strategy: self
                .strategy
                .ok_or(LoadError::MissingDependency("load strategy"))?,
            sampler: self.sampler.ok_or(LoadError::MissingDependency("sampler"))?,
            barrier: self.barrier.ok_or(LoadError::MissingDependency("barrier"))?,
            shutdown: self
                .shutdown
                .ok_or(LoadError::MissingDependency("shutdown flag"))?,
            key_store: self.key_store,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(FingerprintClassifier::default())),
            sleep: self.sleep,
        })
    }
}

/// One load loop, run on its own thread
pub struct Worker {
    id: usize,
    name: String,
    service: Arc<dyn Service>,
    strategy: Box<dyn LoadStrategy>,
    sampler: Arc<Sampler>,
    barrier: Arc<Barrier>,
    shutdown: Arc<AtomicBool>,
    key_store: Option<Arc<dyn KeyStore>>,
    classifier: Arc<dyn FailureClassifier>,
    sleep: Option<Duration>,
}

impl Worker {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for all peers, then issues operations until the strategy returns
    /// `None`. After the shutdown flag is raised the strategy is asked exactly
    /// once more. The strategy is stopped on every exit path; an error also
    /// raises the shutdown flag so peers wind down.
    pub fn run(mut self) -> Result<WorkerReport, LoadError> {
        self.barrier.wait();
        crate::log_worker_start!(self.name, self.strategy.name());

        let mut report = WorkerReport::new(self.name.as_str());
        let result = self.run_loop(&mut report);

        if let Err(e) = self.strategy.stop() {
            crate::log_shutdown_failure!(self.name.as_str(), e);
        }
        if let Err(e) = &result {
            tracing::error!(worker = %self.name, error = %e, "Worker aborted");
            self.shutdown.store(true, Ordering::Release);
        }
        crate::log_worker_exit!(self.name, report.operations, report.failure_count());
        result.map(|_| report)
    }

    fn run_loop(&mut self, report: &mut WorkerReport) -> Result<(), LoadError> {
        let mut ctx = WorkerContext::new(self.id);
        let mut last: Option<Operation> = None;
        let mut last_written_key: Option<String> = None;
        let mut grace_used = false;

        loop {
            // once the flag is seen the strategy gets one more call, whatever it returns
            let shutting_down = self.shutdown.load(Ordering::Acquire);
            if shutting_down {
                if grace_used {
                    break;
                }
                grace_used = true;
            }
            let mut operation = match self.strategy.next(
                last.as_ref(),
                last_written_key.as_deref(),
                shutting_down,
            )? {
                Some(operation) => operation,
                None => break,
            };

            let start = monotonic_nanos();
            let failure = self.perform(&mut operation, &mut ctx);
            let end = monotonic_nanos();
            self.sampler
                .record(operation.operation_type(), start, end, failure)?;
            report.record(failure);

            if failure.is_none() && operation.operation_type() == OperationType::Write {
                if let Some(key) = operation.key() {
                    if let Some(store) = &self.key_store {
                        store.store(key, operation.value())?;
                    }
                    last_written_key = Some(key.to_string());
                }
            }
            last = Some(operation);

            if let Some(sleep) = self.sleep {
                if !self.shutdown.load(Ordering::Acquire) {
                    std::thread::sleep(sleep);
                }
            }
        }
        Ok(())
    }

    /// Executes one operation; any error or panic becomes a classified failure
    fn perform(&self, operation: &mut Operation, ctx: &mut WorkerContext) -> Option<FailureKind> {
        let service = self.service.as_ref();
        match catch_unwind(AssertUnwindSafe(|| service.perform(operation, ctx))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(self.classifier.classify(&e)),
            Err(_) => {
                tracing::warn!(
                    worker = %self.name,
                    operation = %operation.operation_type(),
                    "Service panicked while performing operation"
                );
                operation.set_outcome(Outcome::failure());
                Some(FailureKind::Other)
            }
        }
    }
}
