use crate::constants::DEFAULT_LOG_FILTER;
use std::io;
/// Structured logging for load runs
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Initialize structured logging with optional JSON output.
///
/// Logs go to stderr so CSV rows written to stdout stay clean.
pub fn init_logging(json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = Registry::default().with(env_filter);

    if json_output {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    }

    Ok(())
}

#[macro_export]
macro_rules! log_worker_start {
    ($worker:expr, $strategy:expr) => {
        tracing::debug!(
            strategy = %$strategy,
            "{}",
            $crate::logging::TraceEvent::WorkerStarted {
                worker: $worker.to_string(),
            }
        );
    };
}

#[macro_export]
macro_rules! log_worker_exit {
    ($worker:expr, $operations:expr, $failures:expr) => {
        tracing::debug!(
            failures = $failures,
            "{}",
            $crate::logging::TraceEvent::WorkerExited {
                worker: $worker.to_string(),
                operations: $operations,
            }
        );
    };
}

#[macro_export]
macro_rules! log_interval_flush {
    ($start_ms:expr, $windows:expr, $operations:expr) => {
        tracing::trace!(
            operations = $operations,
            "{}",
            $crate::logging::TraceEvent::IntervalFlushed {
                start_ms: $start_ms,
                windows: $windows,
            }
        );
    };
}

#[macro_export]
macro_rules! log_shutdown_failure {
    ($component:expr, $error:expr) => {
        tracing::error!(
            component = $component,
            error = %$error,
            "Failed to stop component, continuing shutdown"
        );
    };
}

/// Lifecycle milestones of a load run
#[derive(Debug, Clone)]
pub enum TraceEvent {
    RunStarted { strategy: String, service: String, threads: usize },
    WorkerStarted { worker: String },
    WorkerExited { worker: String, operations: u64 },
    IntervalFlushed { start_ms: u64, windows: usize },
    ShutdownRequested,
    ShutdownStepFailed { component: String, message: String },
    RunFinished { operations: u64, elapsed_ms: u64 },
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunStarted {
                strategy,
                service,
                threads,
            } => {
                write!(
                    f,
                    "Run started: {} against {} with {} threads",
                    strategy, service, threads
                )
            }
            Self::WorkerStarted { worker } => write!(f, "Worker {} started", worker),
            Self::WorkerExited { worker, operations } => {
                write!(f, "Worker {} exited after {} operations", worker, operations)
            }
            Self::IntervalFlushed { start_ms, windows } => {
                write!(f, "Interval at {} flushed into {} windows", start_ms, windows)
            }
            Self::ShutdownRequested => write!(f, "Shutdown requested"),
            Self::ShutdownStepFailed { component, message } => {
                write!(f, "Stopping {} failed: {}", component, message)
            }
            Self::RunFinished {
                operations,
                elapsed_ms,
            } => {
                write!(f, "Run finished: {} operations in {}ms", operations, elapsed_ms)
            }
        }
    }
}
