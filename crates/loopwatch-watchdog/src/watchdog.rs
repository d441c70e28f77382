//! The watchdog core: lifecycle, boundary decision logic, and the failure
//! escape hatch.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use loopwatch_stacks::StackSource;

use crate::config::WatchdogConfig;
use crate::error::{WatchdogError, WatchdogResult};
use crate::listener::{DispatchBoundaryListener, DispatchHook, DispatchSink};
use crate::report::{LogReporter, Reporter};
use crate::sampler::{SamplerRun, SamplerTask};
use crate::worker::{SamplerWorker, WorkerHandle};

/// How long `stop` waits for the worker to quiesce before detaching it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle state of a watchdog instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// No listener installed, no background worker alive.
    Stopped,
    /// Listener installed; a worker is standing by for dispatches.
    Running,
}

/// State of one `start()`..`stop()` session.
///
/// The listener captures an `Arc` of this at install time, so the
/// per-dispatch path works entirely on state it already holds and never
/// dereferences the watchdog's own lifecycle guard.
pub(crate) struct SessionCore {
    config: WatchdogConfig,
    worker: WorkerHandle,
    source: Arc<dyn StackSource>,
    reporter: Arc<dyn Reporter>,
    /// The run belonging to the dispatch currently in flight. Written only
    /// by the monitored thread (begin/end) and the cold failure-report path.
    /// Sampler ticks never read this slot: each task checks its own captured
    /// run's flag, which is what keeps the cancellation race confined to a
    /// single run.
    current: Mutex<Option<Arc<SamplerRun>>>,
}

impl SessionCore {
    /// A dispatch just started on the monitored thread.
    pub(crate) fn on_dispatch_begin(&self) {
        let task_id = self.worker.next_task_id();
        let run = Arc::new(SamplerRun::new(task_id));
        let task = SamplerTask::new(
            Arc::clone(&run),
            Arc::clone(&self.source),
            Arc::clone(&self.reporter),
            self.config.self_timeout(),
            self.config.sample_interval,
        );
        // A still-lingering previous run is superseded, not cancelled: its
        // own flag and self-timeout decide how it winds down.
        *self.current.lock() = Some(run);
        self.worker
            .schedule_in(task_id, self.config.initial_sample_delay, Box::new(task));
    }

    /// The in-flight dispatch finished after `elapsed`.
    pub(crate) fn on_dispatch_end(&self, elapsed: Duration) {
        let Some(run) = self.current.lock().take() else {
            return;
        };
        if elapsed >= self.config.stall_threshold {
            // Deliberately not cancelling: the run's self-timeout will dump
            // the gathered stacks. The direct line and the sampler's report
            // may both fire; duplicates are tolerated.
            self.reporter.stall_detected(elapsed);
        } else {
            run.cancel();
            self.worker.cancel(run.task_id());
        }
    }

    /// Treat the in-flight dispatch as timed out right now, report whatever
    /// was gathered, and terminate the run.
    fn force_report(&self) {
        let Some(run) = self.current.lock().take() else {
            return;
        };
        self.reporter.stall_detected(run.elapsed());
        self.reporter.report(run.drain());
        run.cancel();
        self.worker.cancel(run.task_id());
    }
}

struct RunningSession {
    core: Arc<SessionCore>,
    worker: SamplerWorker,
}

/// Watchdog over one designated main loop.
///
/// Constructed explicitly by the host's startup code over the two facilities
/// it consumes: the loop's dispatch instrumentation and a stack source
/// targeting the monitored thread. One instance, passed by handle to
/// whatever needs [`send_failure_report`](Self::send_failure_report).
///
/// `start`/`stop` are owner operations; the begin/end path runs on the
/// monitored thread via the installed listener and never blocks.
pub struct LoopWatchdog {
    hook: Arc<dyn DispatchHook>,
    source: Arc<dyn StackSource>,
    reporter: Arc<dyn Reporter>,
    state: Mutex<Option<RunningSession>>,
}

impl LoopWatchdog {
    /// Watchdog reporting through the default [`LogReporter`].
    #[must_use]
    pub fn new(hook: Arc<dyn DispatchHook>, source: Arc<dyn StackSource>) -> Self {
        Self::with_reporter(hook, source, Arc::new(LogReporter::new()))
    }

    /// Watchdog with a custom report sink.
    #[must_use]
    pub fn with_reporter(
        hook: Arc<dyn DispatchHook>,
        source: Arc<dyn StackSource>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            hook,
            source,
            reporter,
            state: Mutex::new(None),
        }
    }

    /// Start watching: spawn a fresh background worker and install the
    /// boundary listener into the loop facility.
    ///
    /// Idempotent by replacement — when already running, the previous
    /// session is torn down completely first.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::AlreadyInitialized`] when another thread is inside
    /// `start`/`stop` at the same moment (lifecycle calls belong to one
    /// owning thread); [`WatchdogError::InvalidConfiguration`] or
    /// [`WatchdogError::WorkerSpawn`] when setup fails before anything was
    /// replaced.
    pub fn start(&self, config: WatchdogConfig) -> WatchdogResult<()> {
        config.validate()?;
        let mut state = self
            .state
            .try_lock()
            .ok_or(WatchdogError::AlreadyInitialized)?;

        if let Some(previous) = state.take() {
            Self::teardown(previous, self.hook.as_ref());
        }

        let worker = SamplerWorker::spawn().map_err(WatchdogError::worker_spawn)?;
        let core = Arc::new(SessionCore {
            config: config.clone(),
            worker: worker.handle(),
            source: Arc::clone(&self.source),
            reporter: Arc::clone(&self.reporter),
            current: Mutex::new(None),
        });
        let listener: Arc<dyn DispatchSink> =
            Arc::new(DispatchBoundaryListener::new(Arc::clone(&core)));
        self.hook.install(Some(listener));
        *state = Some(RunningSession { core, worker });

        info!(
            target: "loopwatch",
            stall_threshold_ms = config.stall_threshold.as_millis() as u64,
            sample_interval_ms = config.sample_interval.as_millis() as u64,
            "watchdog started"
        );
        Ok(())
    }

    /// Stop watching: uninstall the listener, tear down the background
    /// worker, release all sampler state. A no-op when not running.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(session) = state.take() {
            Self::teardown(session, self.hook.as_ref());
            info!(target: "loopwatch", "watchdog stopped");
        }
    }

    fn teardown(session: RunningSession, hook: &dyn DispatchHook) {
        hook.install(None);
        session.core.current.lock().take();
        session.worker.shutdown(SHUTDOWN_GRACE);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatchdogState {
        if self.state.lock().is_some() {
            WatchdogState::Running
        } else {
            WatchdogState::Stopped
        }
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == WatchdogState::Running
    }

    /// Escape hatch for a global failure handler: behave as if the in-flight
    /// dispatch just ended past its threshold, report everything gathered so
    /// far synchronously, and schedule nothing further. A no-op when not
    /// running or when no dispatch is in flight.
    pub fn send_failure_report(&self) {
        let state = self.state.lock();
        if let Some(session) = state.as_ref() {
            session.core.force_report();
        }
    }
}

impl Drop for LoopWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LoopWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopWatchdog")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
