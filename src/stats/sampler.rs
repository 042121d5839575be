//! Periodic snapshots of the per-operation counters.
//!
//! Workers call [`Sampler::record`] on the hot path; that only touches the
//! counter of the operation type, which is lock-free. A background thread
//! wakes every run interval and emits every whole sampling interval that has
//! elapsed since the last flush. When the thread falls behind, the counts of
//! the late flush are spread over the skipped windows with [`extrapolate`].

use super::counter::Counter;
use super::extrapolate::extrapolate;
use super::formatter::SamplingConsumer;
use super::interval::SamplingInterval;
use super::metrics::MetricSource;
use crate::clock::wall_clock_ms;
use crate::error::LoadError;
use crate::failure::FailureKind;
use crate::operation::OperationType;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Nominal width of one sampling interval
    pub sampling_interval_ms: u64,
    /// How often the background thread checks for elapsed intervals
    pub run_interval_ms: u64,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.sampling_interval_ms == 0 {
            return Err(LoadError::config(
                "sampling_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.run_interval_ms == 0 || self.run_interval_ms > self.sampling_interval_ms {
            return Err(LoadError::config(
                "sampler_run_interval_ms",
                "must be between 1 and the sampling interval",
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Window {
    start_ms: Option<u64>,
    annotations: Vec<String>,
    closed: bool,
}

pub struct Sampler {
    config: SamplerConfig,
    counters: BTreeMap<OperationType, Counter>,
    metrics: Box<dyn MetricSource>,
    consumers: Mutex<Vec<Box<dyn SamplingConsumer>>>,
    window: Mutex<Window>,
    running: Mutex<bool>,
    wake: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    emitted: AtomicU64,
}

impl Sampler {
    pub fn new(
        config: SamplerConfig,
        operations: impl IntoIterator<Item = OperationType>,
        metrics: Box<dyn MetricSource>,
    ) -> Result<Self, LoadError> {
        config.validate()?;
        let counters = operations
            .into_iter()
            .map(|op| (op, Counter::new(op)))
            .collect();
        Ok(Self {
            config,
            counters,
            metrics,
            consumers: Mutex::new(Vec::new()),
            window: Mutex::new(Window::default()),
            running: Mutex::new(false),
            wake: Condvar::new(),
            thread: Mutex::new(None),
            emitted: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> SamplerConfig {
        self.config
    }

    pub fn tracks(&self, operation: OperationType) -> bool {
        self.counters.contains_key(&operation)
    }

    pub fn operation_types(&self) -> Vec<OperationType> {
        self.counters.keys().copied().collect()
    }

    pub fn add_consumer(&self, consumer: Box<dyn SamplingConsumer>) {
        self.consumers.lock().push(consumer);
    }

    /// Number of intervals handed to consumers so far
    pub fn emitted_intervals(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Records one completed operation, `failure` is `None` for a success
    pub fn record(
        &self,
        operation: OperationType,
        start_nanos: u64,
        end_nanos: u64,
        failure: Option<FailureKind>,
    ) -> Result<(), LoadError> {
        let counter = self.counters.get(&operation).ok_or_else(|| {
            LoadError::illegal_state(format!("no counter registered for {}", operation))
        })?;
        counter.update(start_nanos, end_nanos, failure.as_slice())
    }

    /// Attaches a note to the interval currently being recorded
    pub fn annotate(&self, text: impl Into<String>) {
        self.window.lock().annotations.push(text.into());
    }

    /// Starts the first interval at `start_ms` without spawning the
    /// background thread; the caller drives [`Sampler::sample`] itself.
    pub fn open(&self, start_ms: u64) -> Result<(), LoadError> {
        let mut window = self.window.lock();
        if window.start_ms.is_some() {
            return Err(LoadError::illegal_state("sampler already started"));
        }
        window.start_ms = Some(start_ms);
        window.closed = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        let window = self.window.lock();
        window.start_ms.is_some() && !window.closed
    }

    pub fn start(self: &Arc<Self>) -> Result<(), LoadError> {
        self.open(wall_clock_ms())?;
        *self.running.lock() = true;

        let sampler = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("stampede-sampler".to_string())
            .spawn(move || sampler.run_loop())?;
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    fn run_loop(&self) {
        let period = Duration::from_millis(self.config.run_interval_ms);
        loop {
            {
                let mut running = self.running.lock();
                if !*running {
                    break;
                }
                self.wake.wait_for(&mut running, period);
                if !*running {
                    break;
                }
            }
            if let Err(e) = self.sample(wall_clock_ms()) {
                tracing::error!(error = %e, "Sampling failed");
            }
        }
    }

    /// Emits every whole interval elapsed before `now_ms`.
    ///
    /// Returns the number of intervals emitted; zero while the current
    /// interval is still open.
    pub fn sample(&self, now_ms: u64) -> Result<usize, LoadError> {
        let mut window = self.window.lock();
        let start_ms = self.current_start(&window)?;
        let width = self.config.sampling_interval_ms;
        let whole = now_ms.saturating_sub(start_ms) / width;
        if whole == 0 {
            return Ok(0);
        }

        let recorded = self.snapshot(start_ms, &mut window);
        let operations = recorded.total_operations();
        let extra = i64::try_from(whole - 1).unwrap_or(i64::MAX);
        let windows = match extrapolate(&recorded, extra) {
            Ok(windows) => windows,
            Err(e) => {
                // e.g. a wall clock jump; the skipped windows are dropped
                tracing::warn!(skipped = whole - 1, error = %e, "Cannot spread late flush");
                vec![recorded]
            }
        };
        window.start_ms = Some(start_ms + whole * width);
        self.emit(&windows);
        crate::log_interval_flush!(start_ms, windows.len(), operations);
        Ok(windows.len())
    }

    /// Stops the background thread, if any, and flushes what is left
    pub fn stop(&self) -> Result<(), LoadError> {
        *self.running.lock() = false;
        self.wake.notify_all();
        if let Some(handle) = self.thread.lock().take() {
            handle
                .join()
                .map_err(|_| LoadError::illegal_state("sampler thread panicked"))?;
        }
        self.close(wall_clock_ms())
    }

    /// Final flush: whole elapsed intervals, then the partial one.
    ///
    /// The partial interval keeps the nominal width, so its rates may read
    /// lower than the true throughput.
    pub fn close(&self, now_ms: u64) -> Result<(), LoadError> {
        self.sample(now_ms)?;

        let mut window = self.window.lock();
        let start_ms = self.current_start(&window)?;
        let recorded = self.snapshot(start_ms, &mut window);
        if now_ms > start_ms || recorded.total_operations() > 0 || !recorded.annotations.is_empty()
        {
            self.emit(std::slice::from_ref(&recorded));
        }
        window.closed = true;
        drop(window);

        let mut first_error = None;
        for consumer in self.consumers.lock().iter_mut() {
            if let Err(e) = consumer.close() {
                tracing::warn!(error = %e, "Sampling consumer failed to close");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn current_start(&self, window: &Window) -> Result<u64, LoadError> {
        match window.start_ms {
            Some(_) if window.closed => Err(LoadError::illegal_state("sampler already stopped")),
            Some(start_ms) => Ok(start_ms),
            None => Err(LoadError::illegal_state("sampler not started")),
        }
    }

    fn snapshot(&self, start_ms: u64, window: &mut Window) -> SamplingInterval {
        let mut interval = SamplingInterval::new(start_ms, self.config.sampling_interval_ms);
        for (operation, counter) in &self.counters {
            interval.counters.insert(*operation, counter.get_and_reset());
        }
        interval.metrics = self.metrics.collect();
        interval.annotations = std::mem::take(&mut window.annotations);
        interval
    }

    fn emit(&self, intervals: &[SamplingInterval]) {
        let mut consumers = self.consumers.lock();
        for interval in intervals {
            for consumer in consumers.iter_mut() {
                if let Err(e) = consumer.consume(interval) {
                    tracing::warn!(
                        start_ms = interval.start_ms,
                        error = %e,
                        "Sampling consumer rejected interval"
                    );
                }
            }
        }
        self.emitted
            .fetch_add(intervals.len() as u64, Ordering::Relaxed);
    }
}
