//! Stall report formatting and emission.

use std::time::Duration;

use tracing::{info, warn};

use loopwatch_stacks::StackFrame;

use crate::sampler::SampleBuffer;

/// Frames per emitted record, keeping every log line comfortably inside
/// typical sink line limits.
pub const FRAMES_PER_RECORD: usize = 16;

/// Sink for stall diagnostics.
///
/// Implemented by [`LogReporter`] for production; tests substitute recording
/// implementations. Neither method may block for long or fail outward — a
/// reporter problem must never be able to stall the loop it watches.
pub trait Reporter: Send + Sync {
    /// A dispatch was observed to finish at or over the stall threshold.
    /// Emitted directly from the end boundary, independently of (and possibly
    /// in addition to) the sampler's own report.
    fn stall_detected(&self, elapsed: Duration);

    /// A sampler run confirmed a stall; `samples` is everything it gathered.
    /// An empty buffer is a no-op.
    fn report(&self, samples: SampleBuffer);
}

/// Formats samples into a bounded sequence of `tracing` records.
///
/// Pure formatting: no retry, no buffering across calls. One warn record
/// announces the stall, then each sample becomes one info record per
/// [`FRAMES_PER_RECORD`] frames, prefixed with the elapsed time at which the
/// sample was taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl LogReporter {
    /// Reporter writing to the `loopwatch` log target.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for LogReporter {
    fn stall_detected(&self, elapsed: Duration) {
        warn!(
            target: "loopwatch",
            elapsed_ms = elapsed.as_millis() as u64,
            "dispatch exceeded stall threshold"
        );
    }

    fn report(&self, samples: SampleBuffer) {
        if samples.is_empty() {
            return;
        }
        warn!(
            target: "loopwatch",
            sample_count = samples.len(),
            "main loop stall confirmed; sampled stacks follow"
        );
        for sample in samples.into_samples() {
            let elapsed_ms = sample.elapsed.as_millis() as u64;
            let frame_count = sample.frames.len();
            for (part, record) in frame_records(&sample.frames).into_iter().enumerate() {
                info!(
                    target: "loopwatch",
                    elapsed_ms,
                    frame_count,
                    part,
                    "stack at +{elapsed_ms}ms:\n    {record}"
                );
            }
        }
    }
}

/// Render frames into record-sized chunks, one rendered frame per line.
///
/// Exposed so custom [`Reporter`] implementations can reuse the layout.
#[must_use]
pub fn frame_records(frames: &[StackFrame]) -> Vec<String> {
    frames
        .chunks(FRAMES_PER_RECORD)
        .map(|chunk| {
            chunk
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n    ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::StackSample;

    fn frames(n: usize) -> Vec<StackFrame> {
        (0..n).map(|i| StackFrame::named(format!("app::f{i}"))).collect()
    }

    #[test]
    fn test_frame_records_chunking() {
        assert!(frame_records(&frames(0)).is_empty());
        assert_eq!(frame_records(&frames(1)).len(), 1);
        assert_eq!(frame_records(&frames(FRAMES_PER_RECORD)).len(), 1);
        assert_eq!(frame_records(&frames(FRAMES_PER_RECORD + 1)).len(), 2);
    }

    #[test]
    fn test_frame_records_preserve_order() {
        let records = frame_records(&frames(3));
        assert_eq!(records.len(), 1);
        let record = &records[0];
        let f0 = record.find("app::f0");
        let f2 = record.find("app::f2");
        assert!(f0.is_some() && f2.is_some());
        assert!(f0 < f2, "frames must render innermost first");
    }

    #[test]
    fn test_log_reporter_handles_empty_buffer() {
        // Contract: empty buffer is a no-op, even with a live subscriber.
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            LogReporter::new().report(SampleBuffer::new());
        });
    }

    #[test]
    fn test_log_reporter_emits_samples() {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut buffer = SampleBuffer::new();
            buffer.push(StackSample {
                elapsed: std::time::Duration::from_millis(160),
                frames: frames(40),
            });
            let reporter = LogReporter::new();
            reporter.stall_detected(std::time::Duration::from_millis(900));
            reporter.report(buffer);
        });
    }
}
