//! Repairs gaps left when the sampler flushes later than one interval width.
//!
//! Everything counted during the late flush is spread evenly over the recorded
//! window plus the skipped ones. Integer division leaves a remainder, which
//! goes to the last window so the windows add up to exactly what was recorded.

use super::counter::{CounterValues, FailureValues};
use super::interval::SamplingInterval;
use crate::constants::MAX_EXTRAPOLATED_WINDOWS;
use crate::error::LoadError;
use std::collections::BTreeMap;

/// Splits `recorded` into `extra_samples + 1` consecutive windows.
///
/// Annotations go to the first window only; metrics are copied into every
/// window. With `extra_samples == 0` the recorded interval is returned as is.
pub fn extrapolate(
    recorded: &SamplingInterval,
    extra_samples: i64,
) -> Result<Vec<SamplingInterval>, LoadError> {
    if extra_samples < 0 {
        return Err(LoadError::invalid_argument(format!(
            "extra samples must not be negative, got {}",
            extra_samples
        )));
    }
    if extra_samples == 0 {
        return Ok(vec![recorded.clone()]);
    }

    let windows = extra_samples as u64 + 1;
    if windows > MAX_EXTRAPOLATED_WINDOWS {
        return Err(LoadError::invalid_argument(format!(
            "{} extra samples exceed the limit of {} windows",
            extra_samples, MAX_EXTRAPOLATED_WINDOWS
        )));
    }
    (extra_samples as u64)
        .checked_mul(recorded.duration_ms)
        .and_then(|span| span.checked_add(recorded.duration_ms))
        .and_then(|span| recorded.start_ms.checked_add(span))
        .ok_or_else(|| {
            LoadError::invalid_argument(format!(
                "{} windows of {} ms from {} overflow the timestamp range",
                windows, recorded.duration_ms, recorded.start_ms
            ))
        })?;
    let mut result: Vec<SamplingInterval> = (0..windows)
        .map(|i| SamplingInterval {
            start_ms: recorded.start_ms + i * recorded.duration_ms,
            duration_ms: recorded.duration_ms,
            counters: BTreeMap::new(),
            metrics: recorded.metrics.clone(),
            annotations: if i == 0 {
                recorded.annotations.clone()
            } else {
                Vec::new()
            },
        })
        .collect();

    for (operation, values) in &recorded.counters {
        let successes = split(values.success_count, values.success_duration_nanos, windows);
        let failures: Vec<_> = values
            .failures
            .iter()
            .map(|(kind, f)| (*kind, split(f.count, f.duration_nanos, windows)))
            .collect();

        for (i, window) in result.iter_mut().enumerate() {
            let (success_count, success_duration_nanos) = successes[i];
            let failures = failures
                .iter()
                .map(|(kind, shares)| {
                    let (count, duration_nanos) = shares[i];
                    (
                        *kind,
                        FailureValues {
                            count,
                            duration_nanos,
                        },
                    )
                })
                .collect();
            window.counters.insert(
                *operation,
                CounterValues {
                    success_count,
                    success_duration_nanos,
                    failures,
                },
            );
        }
    }

    Ok(result)
}

/// Even shares of `(count, duration)`; the last share takes the remainder
fn split(count: u64, duration: u64, windows: u64) -> Vec<(u64, u64)> {
    let mut shares = Vec::with_capacity(windows as usize);
    let mut distributed_count = 0;
    let mut distributed_duration = 0;
    for _ in 1..windows {
        let share = count / windows;
        let duration_share = if share != 0 { duration / windows } else { 0 };
        distributed_count += share;
        distributed_duration += duration_share;
        shares.push((share, duration_share));
    }
    shares.push((count - distributed_count, duration - distributed_duration));
    shares
}
