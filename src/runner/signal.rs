use crate::error::LoadError;
use crate::logging::TraceEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raises `shutdown` on SIGINT or SIGTERM so workers wind down and the
/// sampler flushes its last interval. Can be installed once per process.
pub fn install_signal_handler(shutdown: Arc<AtomicBool>) -> Result<(), LoadError> {
    ctrlc::set_handler(move || {
        if request_shutdown(&shutdown) {
            tracing::info!(signal = true, "{}", TraceEvent::ShutdownRequested);
        } else {
            tracing::warn!("Shutdown already in progress");
        }
    })
    .map_err(|e| LoadError::Other(e.into()))
}

/// Sets the flag; true if this call raised it
pub fn request_shutdown(shutdown: &AtomicBool) -> bool {
    !shutdown.swap(true, Ordering::AcqRel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_request_raises_flag() {
        let flag = AtomicBool::new(false);
        assert!(request_shutdown(&flag));
        assert!(flag.load(Ordering::Acquire));
        assert!(!request_shutdown(&flag));
    }
}
