//! Watchdog timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{WatchdogError, WatchdogResult};

/// Timing configuration for one watchdog instance.
///
/// Immutable for the lifetime of a `start()`..`stop()` session; to change
/// values, restart the watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// A dispatch running at least this long is a stall.
    pub stall_threshold: Duration,
    /// Gap between consecutive stack samples while a dispatch is in flight.
    pub sample_interval: Duration,
    /// Delay before the first sample of a dispatch, so short dispatches
    /// usually finish before any sampling work happens at all.
    pub initial_sample_delay: Duration,
    /// Extra margin added to the sampler's independent timeout check, to
    /// absorb scheduling jitter between the monitored thread's view of the
    /// dispatch end and the background worker's clock.
    pub sync_slack: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_millis(800),
            sample_interval: Duration::from_millis(160),
            initial_sample_delay: Duration::from_millis(80),
            sync_slack: Duration::from_millis(100),
        }
    }
}

impl WatchdogConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.stall_threshold.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "stall_threshold must be greater than 0",
            ));
        }
        if self.sample_interval.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "sample_interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// The elapsed time past which a sampler run declares the stall itself,
    /// independent of any dispatch-end notification.
    #[must_use]
    pub fn self_timeout(&self) -> Duration {
        self.stall_threshold + self.sync_slack
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }
}

/// Builder for [`WatchdogConfig`].
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Set the stall threshold.
    #[must_use]
    pub fn stall_threshold(mut self, threshold: Duration) -> Self {
        self.config.stall_threshold = threshold;
        self
    }

    /// Set the interval between stack samples.
    #[must_use]
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.config.sample_interval = interval;
        self
    }

    /// Set the delay before a dispatch's first sample.
    #[must_use]
    pub fn initial_sample_delay(mut self, delay: Duration) -> Self {
        self.config.initial_sample_delay = delay;
        self
    }

    /// Set the synchronization slack added to the self-timeout.
    #[must_use]
    pub fn sync_slack(mut self, slack: Duration) -> Self {
        self.config.sync_slack = slack;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WatchdogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stall_threshold, Duration::from_millis(800));
        assert_eq!(config.sample_interval, Duration::from_millis(160));
    }

    #[test]
    fn test_self_timeout_includes_slack() {
        let config = WatchdogConfig::default();
        assert_eq!(config.self_timeout(), Duration::from_millis(900));
    }

    #[test]
    fn test_config_builder() {
        let config = WatchdogConfig::builder()
            .stall_threshold(Duration::from_millis(400))
            .sample_interval(Duration::from_millis(100))
            .initial_sample_delay(Duration::from_millis(100))
            .sync_slack(Duration::from_millis(100))
            .build();
        match config {
            Ok(config) => {
                assert_eq!(config.stall_threshold, Duration::from_millis(400));
                assert_eq!(config.self_timeout(), Duration::from_millis(500));
            }
            Err(e) => unreachable!("builder rejected a valid config: {e}"),
        }
    }

    #[test]
    fn test_config_validation_rejects_zero_durations() {
        let config = WatchdogConfig {
            stall_threshold: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WatchdogConfig {
            sample_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_delay_and_slack_are_allowed() {
        let config = WatchdogConfig {
            initial_sample_delay: Duration::ZERO,
            sync_slack: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
