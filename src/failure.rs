//! Failure taxonomy for operational errors.
//!
//! Every error a service reports is filed under one [`FailureKind`] before it
//! reaches the counters. The mapping is pluggable: backends with their own
//! client libraries can supply a [`FailureClassifier`] that knows their error
//! messages.

use crate::constants::MAX_REPORTED_FAILURES;
use crate::error::ServiceError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;

/// Fixed set of buckets failures are counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    ConnectionRefused,
    BrokenPipe,
    ConnectionReset,
    Timeout,
    PoolExhausted,
    Other,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        FailureKind::ConnectionRefused,
        FailureKind::BrokenPipe,
        FailureKind::ConnectionReset,
        FailureKind::Timeout,
        FailureKind::PoolExhausted,
        FailureKind::Other,
    ];

    /// Stable label used in output columns
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection-refused",
            Self::BrokenPipe => "broken-pipe",
            Self::ConnectionReset => "connection-reset",
            Self::Timeout => "timeout",
            Self::PoolExhausted => "pool-exhausted",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a service error to the bucket it is counted in
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, err: &ServiceError) -> FailureKind;
}

/// Classifier driven by error structure first and message fingerprints second.
///
/// Fingerprints are matched in insertion order, case-insensitively, against the
/// root cause message. Errors that match nothing are filed under
/// [`FailureKind::Other`] and logged once per distinct message shape (digits
/// ignored), for at most [`MAX_REPORTED_FAILURES`] shapes.
pub struct FingerprintClassifier {
    fingerprints: Vec<(String, FailureKind)>,
    reported: Mutex<HashSet<String>>,
}

impl FingerprintClassifier {
    /// Classifier without any message fingerprints
    pub fn empty() -> Self {
        Self {
            fingerprints: Vec::new(),
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_fingerprint(mut self, fragment: &str, kind: FailureKind) -> Self {
        self.fingerprints.push((fragment.to_lowercase(), kind));
        self
    }

    fn match_message(&self, message: &str) -> Option<FailureKind> {
        let message = message.to_lowercase();
        self.fingerprints
            .iter()
            .find(|(fragment, _)| message.contains(fragment.as_str()))
            .map(|(_, kind)| *kind)
    }

    fn classify_io(&self, err: &std::io::Error) -> Option<FailureKind> {
        match err.kind() {
            ErrorKind::ConnectionRefused => Some(FailureKind::ConnectionRefused),
            ErrorKind::BrokenPipe => Some(FailureKind::BrokenPipe),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                Some(FailureKind::ConnectionReset)
            }
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Some(FailureKind::Timeout),
            _ => None,
        }
    }

    fn report_unclassified(&self, message: String) {
        let fingerprint = message_fingerprint(&message);
        let first_time = {
            let mut reported = self.reported.lock();
            reported.len() < MAX_REPORTED_FAILURES && reported.insert(fingerprint)
        };
        if first_time {
            tracing::warn!(error = %message, "Unclassified operation failure");
        }
    }
}

impl Default for FingerprintClassifier {
    fn default() -> Self {
        Self::empty()
            .with_fingerprint("connection refused", FailureKind::ConnectionRefused)
            .with_fingerprint("broken pipe", FailureKind::BrokenPipe)
            .with_fingerprint("connection reset", FailureKind::ConnectionReset)
            .with_fingerprint("timed out", FailureKind::Timeout)
            .with_fingerprint("timeout", FailureKind::Timeout)
            .with_fingerprint("pool exhausted", FailureKind::PoolExhausted)
            .with_fingerprint("no connection available", FailureKind::PoolExhausted)
    }
}

impl FailureClassifier for FingerprintClassifier {
    fn classify(&self, err: &ServiceError) -> FailureKind {
        let structural = match err {
            ServiceError::Io(io) => self.classify_io(io),
            ServiceError::Timeout(_) => Some(FailureKind::Timeout),
            ServiceError::PoolExhausted(_) => Some(FailureKind::PoolExhausted),
            _ => None,
        };
        if let Some(kind) = structural {
            return kind;
        }

        let message = root_cause_message(err);
        if let Some(kind) = self.match_message(&message) {
            return kind;
        }

        self.report_unclassified(message);
        FailureKind::Other
    }
}

/// Message with every run of digits collapsed to `#`, so errors that only
/// differ by a key, id or count share one fingerprint
fn message_fingerprint(message: &str) -> String {
    let mut fingerprint = String::with_capacity(message.len());
    let mut in_digits = false;
    for c in message.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                fingerprint.push('#');
            }
            in_digits = true;
        } else {
            fingerprint.push(c);
            in_digits = false;
        }
    }
    fingerprint
}

/// Message of the innermost error in the source chain
pub fn root_cause_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
