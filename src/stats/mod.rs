//! Statistics: lock-free counters, windowed sampling and interval output.

mod counter;
mod extrapolate;
mod formatter;
mod interval;
pub mod metrics;
mod sampler;

pub use counter::{Counter, CounterValues, FailureValues};
pub use extrapolate::extrapolate;
pub use formatter::{CollectingConsumer, CsvFormatter, SamplingConsumer};
pub use interval::SamplingInterval;
pub use metrics::{MetricReading, MetricSource, NoMetrics, SystemMetrics};
pub use sampler::{Sampler, SamplerConfig};
