//! Property-based tests for configuration and buffer invariants.

use std::time::Duration;

use proptest::prelude::*;

use loopwatch_watchdog::report::{FRAMES_PER_RECORD, frame_records};
use loopwatch_watchdog::{SampleBuffer, StackFrame, StackSample, WatchdogConfig};

proptest! {
    #[test]
    fn test_valid_configs_roundtrip_through_builder(
        threshold_ms in 1..10_000u64,
        interval_ms in 1..10_000u64,
        delay_ms in 0..10_000u64,
        slack_ms in 0..10_000u64,
    ) {
        let config = WatchdogConfig::builder()
            .stall_threshold(Duration::from_millis(threshold_ms))
            .sample_interval(Duration::from_millis(interval_ms))
            .initial_sample_delay(Duration::from_millis(delay_ms))
            .sync_slack(Duration::from_millis(slack_ms))
            .build();

        let config = config.map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(config.stall_threshold, Duration::from_millis(threshold_ms));
        prop_assert_eq!(config.sample_interval, Duration::from_millis(interval_ms));
        prop_assert_eq!(
            config.self_timeout(),
            Duration::from_millis(threshold_ms + slack_ms)
        );
    }

    #[test]
    fn test_zero_threshold_or_interval_is_rejected(
        other_ms in 1..10_000u64,
        zero_threshold in any::<bool>(),
    ) {
        let mut config = WatchdogConfig {
            stall_threshold: Duration::from_millis(other_ms),
            sample_interval: Duration::from_millis(other_ms),
            ..Default::default()
        };
        if zero_threshold {
            config.stall_threshold = Duration::ZERO;
        } else {
            config.sample_interval = Duration::ZERO;
        }
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_preserves_sample_order(
        elapsed_ms in prop::collection::vec(0..100_000u64, 0..64),
    ) {
        let mut buffer = SampleBuffer::new();
        for &ms in &elapsed_ms {
            buffer.push(StackSample {
                elapsed: Duration::from_millis(ms),
                frames: vec![StackFrame::named("app::work")],
            });
        }

        prop_assert_eq!(buffer.len(), elapsed_ms.len());
        prop_assert_eq!(buffer.is_empty(), elapsed_ms.is_empty());
        let recovered: Vec<u64> = buffer
            .into_samples()
            .into_iter()
            .map(|sample| sample.elapsed.as_millis() as u64)
            .collect();
        prop_assert_eq!(recovered, elapsed_ms);
    }

    #[test]
    fn test_frame_records_cover_all_frames(frame_count in 0..200usize) {
        let frames: Vec<StackFrame> = (0..frame_count)
            .map(|i| StackFrame::named(format!("app::f{i}")))
            .collect();

        let records = frame_records(&frames);
        prop_assert_eq!(records.len(), frame_count.div_ceil(FRAMES_PER_RECORD));

        let rendered_lines: usize = records
            .iter()
            .map(|record| record.split("\n    ").count())
            .sum();
        if frame_count > 0 {
            prop_assert_eq!(rendered_lines, frame_count);
        }
    }
}
