// Centralized defaults for the load driver to avoid magic numbers

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 1;

/// Default width of one sampling interval in milliseconds
pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 1_000;

/// Default cadence at which the sampler thread wakes up to check for a flush
pub const DEFAULT_SAMPLER_RUN_INTERVAL_MS: u64 = 250;

/// Default key length in characters
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Default synthetic value length in characters
pub const DEFAULT_VALUE_SIZE: usize = 1_024;

/// Default message payload length for the messaging strategies
pub const DEFAULT_MESSAGE_SIZE: usize = 1_024;

/// Number of keys the delete strategy removes unless told otherwise
pub const DEFAULT_DELETE_KEY_COUNT: u64 = 1;

/// Destination used by the messaging strategies when none is configured
pub const DEFAULT_DESTINATION: &str = "stampede-queue";

/// Upper bound on the windows one late flush is spread over
pub const MAX_EXTRAPOLATED_WINDOWS: u64 = 1_000_000;

/// Granularity at which the coordinator polls workers and the run deadline
pub const COORDINATOR_POLL_MS: u64 = 10;

/// Distinct unclassified failure fingerprints warned about before going quiet
pub const MAX_REPORTED_FAILURES: usize = 256;

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "stampede=info";
