//! Mock implementations of the watchdog's three seams.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use loopwatch_stacks::{CaptureResult, StackCaptureError, StackFrame, StackSource};
use loopwatch_watchdog::{DispatchHook, DispatchSink, Reporter, SampleBuffer};

/// A loop-instrumentation facility driven by hand.
///
/// Tests install the watchdog's sink through the normal [`DispatchHook`]
/// path, then fire boundary notifications themselves to simulate the
/// monitored loop.
#[derive(Default)]
pub struct ManualDispatchHook {
    sink: Mutex<Option<Arc<dyn DispatchSink>>>,
    /// `true` per install of a sink, `false` per uninstall.
    installs: Mutex<Vec<bool>>,
}

impl ManualDispatchHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one opaque boundary notification, exactly as the loop would.
    pub fn fire_boundary(&self) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_boundary();
        }
    }

    /// Readability aliases: begin/end are just alternating boundaries.
    pub fn begin_dispatch(&self) {
        self.fire_boundary();
    }

    /// See [`begin_dispatch`](Self::begin_dispatch).
    pub fn end_dispatch(&self) {
        self.fire_boundary();
    }

    /// Whether a sink is currently installed.
    pub fn is_installed(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Install/uninstall history, in order (`true` = sink installed).
    pub fn install_history(&self) -> Vec<bool> {
        self.installs.lock().clone()
    }
}

impl DispatchHook for ManualDispatchHook {
    fn install(&self, sink: Option<Arc<dyn DispatchSink>>) {
        self.installs.lock().push(sink.is_some());
        *self.sink.lock() = sink;
    }
}

impl std::fmt::Debug for ManualDispatchHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualDispatchHook")
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

/// A [`StackSource`] returning canned frames, with optional scripted failures.
#[derive(Debug, Default)]
pub struct ScriptedStackSource {
    frames: Vec<StackFrame>,
    /// Every n-th capture fails with a timeout when set.
    fail_every: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedStackSource {
    pub fn of_symbols(symbols: &[&str]) -> Self {
        Self {
            frames: symbols.iter().copied().map(StackFrame::named).collect(),
            ..Self::default()
        }
    }

    /// A source whose captures succeed but contain no frames.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Make every `n`-th capture fail with a timeout.
    #[must_use]
    pub fn with_failure_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// How many captures were attempted so far.
    pub fn capture_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl StackSource for ScriptedStackSource {
    fn capture(&self) -> CaptureResult<Vec<StackFrame>> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(n) = self.fail_every {
            if call % n == 0 {
                return Err(StackCaptureError::Timeout(Duration::from_millis(1)));
            }
        }
        Ok(self.frames.clone())
    }
}

/// A [`Reporter`] that records what it was given instead of logging.
///
/// Mirrors the reporter contract: a report with an empty buffer is a no-op
/// and is not recorded.
#[derive(Debug, Default)]
pub struct CountingReporter {
    stalls: Mutex<Vec<Duration>>,
    reports: Mutex<Vec<SampleBuffer>>,
}

impl CountingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed values from every direct stall line, in order.
    pub fn stalls(&self) -> Vec<Duration> {
        self.stalls.lock().clone()
    }

    pub fn stall_count(&self) -> usize {
        self.stalls.lock().len()
    }

    /// Every non-empty reported buffer, in order.
    pub fn reports(&self) -> Vec<SampleBuffer> {
        self.reports.lock().clone()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().len()
    }

    /// Total samples across all reported buffers.
    pub fn total_samples(&self) -> usize {
        self.reports.lock().iter().map(SampleBuffer::len).sum()
    }

    /// Elapsed labels of every reported sample, flattened in order.
    pub fn sample_elapsed(&self) -> Vec<Duration> {
        self.reports
            .lock()
            .iter()
            .flat_map(|buffer| buffer.samples().iter().map(|sample| sample.elapsed))
            .collect()
    }
}

impl Reporter for CountingReporter {
    fn stall_detected(&self, elapsed: Duration) {
        self.stalls.lock().push(elapsed);
    }

    fn report(&self, samples: SampleBuffer) {
        if samples.is_empty() {
            return;
        }
        self.reports.lock().push(samples);
    }
}
