//! The [`StackSource`] capability and its implementations.

use std::time::Duration;

use crate::error::CaptureResult;
use crate::frame::StackFrame;
use crate::platform;

/// Default wait for the target thread's signal handler to reply.
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(50);

/// Identity of the thread whose stack will be captured.
///
/// Create one on the thread to be monitored with [`MonitoredThread::current`]
/// and hand it to whichever component does the sampling. The handle stays
/// valid for the lifetime of the thread; capturing a thread that has exited
/// fails with a delivery error rather than crashing.
#[derive(Debug, Clone)]
pub struct MonitoredThread {
    name: Option<String>,
    #[cfg(unix)]
    pthread: libc::pthread_t,
}

impl MonitoredThread {
    /// Capture the identity of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: std::thread::current().name().map(str::to_owned),
            #[cfg(unix)]
            // SAFETY: pthread_self has no preconditions and always succeeds.
            pthread: unsafe { libc::pthread_self() },
        }
    }

    /// Thread name, when one was set at capture time.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[cfg(unix)]
    pub(crate) fn pthread(&self) -> libc::pthread_t {
        self.pthread
    }
}

/// Capability to capture the current call stack of one designated thread.
///
/// Implementations must be callable from a different thread than the one
/// being introspected and must never leave the target suspended.
pub trait StackSource: Send + Sync {
    /// Capture the target thread's stack as it is right now.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StackCaptureError`] when the capture mechanism
    /// fails; callers are expected to treat this as "no sample this time"
    /// rather than as fatal.
    fn capture(&self) -> CaptureResult<Vec<StackFrame>>;
}

/// Signal-driven capture of another thread's stack (Unix).
///
/// Each [`capture`](StackSource::capture) interrupts the target with a
/// reserved signal; the handler walks the stack into a pre-published buffer
/// and the requesting thread resolves instruction pointers to symbols once
/// the handler has replied. On non-Unix platforms every capture returns
/// [`crate::StackCaptureError::Unsupported`].
#[derive(Debug, Clone)]
pub struct SignalStackSource {
    thread: MonitoredThread,
    reply_timeout: Duration,
}

impl SignalStackSource {
    /// Source targeting the given thread.
    #[must_use]
    pub fn new(thread: MonitoredThread) -> Self {
        Self {
            thread,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Override how long one capture waits for the handler's reply.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// The thread this source targets.
    #[must_use]
    pub fn thread(&self) -> &MonitoredThread {
        &self.thread
    }
}

impl StackSource for SignalStackSource {
    fn capture(&self) -> CaptureResult<Vec<StackFrame>> {
        platform::capture(&self.thread, self.reply_timeout)
    }
}

/// A source that returns the same canned frames on every capture.
///
/// Stand-in for platforms without signal capture, and the base for test
/// doubles.
#[derive(Debug, Clone, Default)]
pub struct FixedStackSource {
    frames: Vec<StackFrame>,
}

impl FixedStackSource {
    /// Source yielding exactly `frames` on every capture.
    #[must_use]
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Convenience constructor from bare symbol names.
    #[must_use]
    pub fn of_symbols(symbols: &[&str]) -> Self {
        Self::new(symbols.iter().copied().map(StackFrame::named).collect())
    }
}

impl StackSource for FixedStackSource {
    fn capture(&self) -> CaptureResult<Vec<StackFrame>> {
        Ok(self.frames.clone())
    }
}
