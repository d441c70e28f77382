//! Per-dispatch stack sampling.
//!
//! One [`SamplerRun`] exists per dispatch. Its tick task lives on the
//! background worker and keeps posting itself back until one of two things
//! happens: the run's cancellation flag is set (the dispatch finished within
//! budget), or the run's own clock passes the self-timeout and it reports
//! whatever it has gathered. The self-timeout is the only hard bound on a
//! run's lifetime; it holds even if no dispatch-end notification ever
//! arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use loopwatch_stacks::{StackFrame, StackSource};

use crate::report::Reporter;
use crate::worker::{TaskId, WorkerHandle, WorkerTask};

/// One stack snapshot, labelled with the time since dispatch start at which
/// it was taken.
#[derive(Debug, Clone)]
pub struct StackSample {
    /// Time between the dispatch's begin boundary and this capture.
    pub elapsed: Duration,
    /// The monitored thread's frames, innermost first.
    pub frames: Vec<StackFrame>,
}

/// Ordered samples accumulated over one dispatch.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<StackSample>,
}

impl SampleBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.
    pub fn push(&mut self, sample: StackSample) {
        self.samples.push(sample);
    }

    /// Number of samples gathered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether any samples were gathered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples in capture order.
    #[must_use]
    pub fn samples(&self) -> &[StackSample] {
        &self.samples
    }

    /// Consume the buffer, yielding samples in capture order.
    #[must_use]
    pub fn into_samples(self) -> Vec<StackSample> {
        self.samples
    }
}

/// State of one sampling session, shared between the task ticking on the
/// worker and the monitored thread that may cancel it.
///
/// The cancellation flag is this run's own; it is never reused across runs,
/// so the only cross-thread race possible is between one run's cancel and
/// its own in-flight tick. That race is accepted: a tick that has already
/// started may append one more sample, or even report once, after
/// cancellation was requested. What cannot happen is a run ticking forever.
#[derive(Debug)]
pub(crate) struct SamplerRun {
    started_at: Instant,
    task_id: TaskId,
    cancelled: AtomicBool,
    /// Steady-state writer is the worker tick alone; the monitored thread
    /// only touches this on the cold failure-report path.
    samples: Mutex<SampleBuffer>,
}

impl SamplerRun {
    pub(crate) fn new(task_id: TaskId) -> Self {
        Self {
            started_at: Instant::now(),
            task_id,
            cancelled: AtomicBool::new(false),
            samples: Mutex::new(SampleBuffer::new()),
        }
    }

    pub(crate) fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Advisory: the next tick that observes the flag stops without a report.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn record(&self, sample: StackSample) {
        self.samples.lock().push(sample);
    }

    /// Take everything gathered so far, leaving the buffer empty.
    pub(crate) fn drain(&self) -> SampleBuffer {
        std::mem::take(&mut *self.samples.lock())
    }
}

/// The periodic tick for one run.
pub(crate) struct SamplerTask {
    run: Arc<SamplerRun>,
    source: Arc<dyn StackSource>,
    reporter: Arc<dyn Reporter>,
    /// `stall_threshold + sync_slack`: past this, the stall is confirmed.
    self_timeout: Duration,
    interval: Duration,
}

impl SamplerTask {
    pub(crate) fn new(
        run: Arc<SamplerRun>,
        source: Arc<dyn StackSource>,
        reporter: Arc<dyn Reporter>,
        self_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            run,
            source,
            reporter,
            self_timeout,
            interval,
        }
    }
}

impl WorkerTask for SamplerTask {
    fn run(self: Box<Self>, worker: &WorkerHandle) {
        if self.run.is_cancelled() {
            // Dispatch finished in time; the gathered samples die with the run.
            return;
        }

        let elapsed = self.run.elapsed();
        if elapsed > self.self_timeout {
            // Self-declared timeout: report and stop, whether or not a
            // dispatch-end notification ever arrives.
            self.reporter.report(self.run.drain());
            return;
        }

        match self.source.capture() {
            Ok(frames) if !frames.is_empty() => {
                self.run.record(StackSample { elapsed, frames });
            }
            Ok(_) => {
                debug!(target: "loopwatch", "stack capture returned no frames; skipping sample");
            }
            Err(error) => {
                debug!(target: "loopwatch", %error, "stack capture failed; skipping sample");
            }
        }

        let id = self.run.task_id();
        let interval = self.interval;
        worker.schedule_in(id, interval, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed_ms: u64) -> StackSample {
        StackSample {
            elapsed: Duration::from_millis(elapsed_ms),
            frames: vec![StackFrame::named("app::busy_work")],
        }
    }

    #[test]
    fn test_buffer_keeps_capture_order() {
        let mut buffer = SampleBuffer::new();
        buffer.push(sample(100));
        buffer.push(sample(200));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.samples()[0].elapsed, Duration::from_millis(100));
        assert_eq!(buffer.samples()[1].elapsed, Duration::from_millis(200));
    }

    #[test]
    fn test_run_drain_empties_buffer() {
        let run = SamplerRun::new(crate::worker::test_task_id());
        run.record(sample(100));
        run.record(sample(260));

        let drained = run.drain();
        assert_eq!(drained.len(), 2);
        assert!(run.drain().is_empty());
    }

    #[test]
    fn test_cancel_is_sticky() {
        let run = SamplerRun::new(crate::worker::test_task_id());
        assert!(!run.is_cancelled());
        run.cancel();
        run.cancel();
        assert!(run.is_cancelled());
    }
}
