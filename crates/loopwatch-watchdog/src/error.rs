//! Error types for the watchdog.

use thiserror::Error;

/// Errors that can occur while managing a watchdog instance.
///
/// Note how small this is: nothing on the dispatch path can fail outward.
/// Boundary notifications, sampling and reporting absorb their own failures
/// so the monitored loop never observes an error from this crate.
#[derive(Debug, Clone, Error)]
pub enum WatchdogError {
    /// `start()` was invoked concurrently with another `start()` or `stop()`
    /// from a different thread. The lifecycle operations are meant to be
    /// called from the single owning thread.
    #[error("watchdog lifecycle operation raced another; start/stop must come from one owner")]
    AlreadyInitialized,

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The background sampler thread could not be spawned.
    #[error("failed to start sampler worker thread: {0}")]
    WorkerSpawn(String),
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a worker spawn error.
    #[must_use]
    pub fn worker_spawn(reason: impl std::fmt::Display) -> Self {
        Self::WorkerSpawn(reason.to_string())
    }
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = std::result::Result<T, WatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchdogError::invalid_configuration("stall_threshold must be greater than 0");
        assert!(err.to_string().contains("stall_threshold"));

        let err = WatchdogError::worker_spawn("no threads left");
        assert!(matches!(err, WatchdogError::WorkerSpawn(_)));
    }
}
