use super::signal::request_shutdown;
use super::worker::WorkerBuilder;
use super::{RunSummary, RunnerConfig, WorkerReport};
use crate::config::{ServiceConfig, StrategyConfig};
use crate::constants::COORDINATOR_POLL_MS;
use crate::error::LoadError;
use crate::failure::{FailureClassifier, FingerprintClassifier};
use crate::key::KeyStore;
use crate::logging::TraceEvent;
use crate::service::Service;
use crate::stats::Sampler;
use crate::strategy::LoadStrategy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Builds the strategy for the worker with the given index
pub type StrategyFactory =
    Box<dyn Fn(usize) -> Result<Box<dyn LoadStrategy>, LoadError> + Send + Sync>;

#[derive(Default)]
pub struct RunnerBuilder {
    config: Option<RunnerConfig>,
    service: Option<Arc<dyn Service>>,
    sampler: Option<Arc<Sampler>>,
    key_store: Option<Arc<dyn KeyStore>>,
    classifier: Option<Arc<dyn FailureClassifier>>,
    strategies: Option<StrategyFactory>,
    service_config: Option<ServiceConfig>,
    strategy_config: Option<StrategyConfig>,
}

impl RunnerBuilder {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }

    pub fn service(mut self, service: Arc<dyn Service>, config: ServiceConfig) -> Self {
        self.service = Some(service);
        self.service_config = Some(config);
        self
    }

    pub fn sampler(mut self, sampler: Arc<Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.key_store = Some(store);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn strategies(mut self, factory: StrategyFactory, config: StrategyConfig) -> Self {
        self.strategies = Some(factory);
        self.strategy_config = Some(config);
        self
    }

    pub fn build(self) -> Result<Runner, LoadError> {
        let config = self.config.ok_or(LoadError::MissingDependency("runner config"))?;
        if config.threads == 0 {
            return Err(LoadError::config("threads", "must be greater than 0"));
        }
        Ok(Runner {
            config,
            service: self.service.ok_or(LoadError::MissingDependency("service"))?,
            service_config: self
                .service_config
                .ok_or(LoadError::MissingDependency("service config"))?,
            sampler: self.sampler.ok_or(LoadError::MissingDependency("sampler"))?,
            key_store: self.key_store,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(FingerprintClassifier::default())),
            strategies: self
                .strategies
                .ok_or(LoadError::MissingDependency("load strategy factory"))?,
            strategy_config: self
                .strategy_config
                .ok_or(LoadError::MissingDependency("strategy config"))?,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Shared resources that were started and must be stopped again
#[derive(Debug, Default, Clone, Copy)]
struct Started {
    service: bool,
    key_store: bool,
    sampler: bool,
}

/// Coordinates one run: shared resources, worker threads and shutdown
pub struct Runner {
    config: RunnerConfig,
    service: Arc<dyn Service>,
    service_config: ServiceConfig,
    sampler: Arc<Sampler>,
    key_store: Option<Arc<dyn KeyStore>>,
    classifier: Arc<dyn FailureClassifier>,
    strategies: StrategyFactory,
    strategy_config: StrategyConfig,
    shutdown: Arc<AtomicBool>,
}

impl Runner {
    /// Flag that ends the run when set, e.g. from a signal handler
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn run(self) -> Result<RunSummary, LoadError> {
        let mut started = Started::default();
        if let Err(e) = self.start_shared(&mut started) {
            self.stop_shared(started);
            return Err(e);
        }

        let mut strategies = match self.prepare_strategies() {
            Ok(strategies) => strategies,
            Err(e) => {
                self.stop_shared(started);
                return Err(e);
            }
        };

        // no interval is emitted for a run that never got to its workers
        if let Err(e) = self.sampler.start() {
            self.stop_strategies(&mut strategies);
            self.stop_shared(started);
            return Err(e);
        }
        started.sampler = true;

        tracing::info!(
            "{}",
            TraceEvent::RunStarted {
                strategy: self.strategy_config.name.clone(),
                service: self.service.name().to_string(),
                threads: self.config.threads,
            }
        );

        let handles = match self.spawn_workers(strategies) {
            Ok(handles) => handles,
            Err(e) => {
                self.shutdown.store(true, Ordering::Release);
                self.stop_shared(started);
                return Err(e);
            }
        };
        let run_start = Instant::now();
        self.wait_for_workers(&handles, run_start);

        let mut reports = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(LoadError::illegal_state("worker thread panicked"));
                }
            }
        }
        let elapsed = run_start.elapsed();

        self.stop_shared(started);

        if let Some(e) = first_error {
            return Err(e);
        }
        let summary = RunSummary::from_reports(&reports, elapsed, self.sampler.emitted_intervals());
        tracing::info!(
            "{}",
            TraceEvent::RunFinished {
                operations: summary.total_operations,
                elapsed_ms: summary.elapsed_ms,
            }
        );
        Ok(summary)
    }

    /// Service, then key store. The sampler is started once every strategy
    /// is ready.
    fn start_shared(&self, started: &mut Started) -> Result<(), LoadError> {
        self.service.start()?;
        started.service = true;
        if let Some(store) = &self.key_store {
            store.start()?;
            started.key_store = true;
        }
        Ok(())
    }

    /// Reverse of start order; every step runs even if an earlier one failed
    fn stop_shared(&self, started: Started) {
        if started.sampler {
            if let Err(e) = self.sampler.stop() {
                self.report_stop_failure("sampler", &e);
            }
        }
        if started.key_store {
            if let Some(store) = &self.key_store {
                if let Err(e) = store.stop() {
                    self.report_stop_failure("key store", &e);
                }
            }
        }
        if started.service {
            if let Err(e) = self.service.stop() {
                self.report_stop_failure("service", &e);
            }
        }
    }

    fn report_stop_failure(&self, component: &str, error: &dyn std::fmt::Display) {
        crate::log_shutdown_failure!(component, error);
        tracing::debug!(
            "{}",
            TraceEvent::ShutdownStepFailed {
                component: component.to_string(),
                message: error.to_string(),
            }
        );
    }

    /// Builds, initializes and starts one strategy per worker. On failure the
    /// strategies started so far are stopped again.
    fn prepare_strategies(&self) -> Result<Vec<Box<dyn LoadStrategy>>, LoadError> {
        let mut prepared: Vec<Box<dyn LoadStrategy>> = Vec::with_capacity(self.config.threads);
        for index in 0..self.config.threads {
            match self.prepare_strategy(index) {
                Ok(strategy) => prepared.push(strategy),
                Err(e) => {
                    self.stop_strategies(&mut prepared);
                    return Err(e);
                }
            }
        }
        Ok(prepared)
    }

    fn stop_strategies(&self, strategies: &mut [Box<dyn LoadStrategy>]) {
        for strategy in strategies.iter_mut() {
            if let Err(e) = strategy.stop() {
                self.report_stop_failure("strategy", &e);
            }
        }
    }

    fn prepare_strategy(&self, index: usize) -> Result<Box<dyn LoadStrategy>, LoadError> {
        let mut strategy = (self.strategies)(index)?;
        strategy.init(&self.service_config, &self.strategy_config)?;
        if let Some(missing) = strategy
            .operation_types()
            .into_iter()
            .find(|op| !self.sampler.tracks(*op))
        {
            return Err(LoadError::illegal_state(format!(
                "sampler has no counter for {} issued by {}",
                missing,
                strategy.name()
            )));
        }
        strategy.start()?;
        Ok(strategy)
    }

    /// Spawns every worker and releases them together through the barrier.
    ///
    /// A failed spawn is fatal: workers already waiting on the barrier are
    /// left behind.
    fn spawn_workers(
        &self,
        strategies: Vec<Box<dyn LoadStrategy>>,
    ) -> Result<Vec<JoinHandle<Result<WorkerReport, LoadError>>>, LoadError> {
        let barrier = Arc::new(Barrier::new(strategies.len() + 1));
        let mut handles = Vec::with_capacity(strategies.len());
        for (index, strategy) in strategies.into_iter().enumerate() {
            let name = format!("worker-{}", index);
            let worker = WorkerBuilder::new(index)
                .name(name.as_str())
                .service(Arc::clone(&self.service))
                .strategy(strategy)
                .sampler(Arc::clone(&self.sampler))
                .barrier(Arc::clone(&barrier))
                .shutdown(Arc::clone(&self.shutdown))
                .key_store(self.key_store.clone())
                .classifier(Arc::clone(&self.classifier))
                .sleep(self.config.sleep)
                .build()?;
            let handle = std::thread::Builder::new()
                .name(name)
                .spawn(move || worker.run())?;
            handles.push(handle);
        }
        barrier.wait();
        Ok(handles)
    }

    /// Polls until every worker has exited, raising the shutdown flag once
    /// the run duration has elapsed
    fn wait_for_workers(
        &self,
        handles: &[JoinHandle<Result<WorkerReport, LoadError>>],
        run_start: Instant,
    ) {
        let deadline = self.config.duration.map(|d| run_start + d);
        let poll = Duration::from_millis(COORDINATOR_POLL_MS);
        while !handles.iter().all(|h| h.is_finished()) {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline && request_shutdown(&self.shutdown) {
                    tracing::info!("{}", TraceEvent::ShutdownRequested);
                }
            }
            std::thread::sleep(poll);
        }
    }
}
