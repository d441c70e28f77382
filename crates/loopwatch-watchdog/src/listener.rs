//! Dispatch boundary detection.
//!
//! The host loop exposes a single opaque notification fired at each dispatch
//! edge; begin versus end is inferred purely by alternation. The listener is
//! invoked synchronously on the monitored thread, so everything here must be
//! non-blocking: a flag flip, a timestamp, and a call into the session core.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::watchdog::SessionCore;

/// The loop-instrumentation facility consumed by the watchdog.
///
/// The host implements this over whatever its loop exposes for observing
/// message dispatch (a logging printer, a dispatch wrapper, an event filter).
/// The facility must invoke the installed sink exactly once when the loop
/// starts processing a unit of work and exactly once when it finishes, on the
/// monitored thread itself.
pub trait DispatchHook: Send + Sync {
    /// Install `sink` as the receiver of boundary notifications, replacing
    /// any previous sink. Installing `None` must fully stop notifications.
    fn install(&self, sink: Option<Arc<dyn DispatchSink>>);
}

/// Receiver of opaque dispatch boundary notifications.
pub trait DispatchSink: Send + Sync {
    /// One boundary crossing, either the start or the finish of a dispatch.
    fn on_boundary(&self);
}

/// Translates the alternating notification stream into begin/end events for
/// the session it was installed with.
///
/// The expectation flag is flipped unconditionally on every notification. If
/// the facility ever violates alternation, pairing stays desynchronized for
/// the rest of the session; that limitation is accepted rather than guessed
/// around.
pub(crate) struct DispatchBoundaryListener {
    core: Arc<SessionCore>,
    /// True when the next notification is a dispatch begin. Starts true.
    expecting_begin: AtomicBool,
    /// Reference point for `started_ns`.
    anchor: Instant,
    /// Nanoseconds from `anchor` to the current dispatch's begin boundary.
    started_ns: AtomicU64,
}

impl DispatchBoundaryListener {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self {
            core,
            expecting_begin: AtomicBool::new(true),
            anchor: Instant::now(),
            started_ns: AtomicU64::new(0),
        }
    }
}

impl DispatchSink for DispatchBoundaryListener {
    fn on_boundary(&self) {
        // Only the monitored thread ever calls this; the atomics keep the
        // type shareable without putting a lock on the per-dispatch path.
        let begin = self.expecting_begin.load(Ordering::Relaxed);
        self.expecting_begin.store(!begin, Ordering::Relaxed);

        if begin {
            self.started_ns
                .store(duration_as_ns(self.anchor.elapsed()), Ordering::Relaxed);
            self.core.on_dispatch_begin();
        } else {
            let started = Duration::from_nanos(self.started_ns.load(Ordering::Relaxed));
            let elapsed = self.anchor.elapsed().saturating_sub(started);
            self.core.on_dispatch_end(elapsed);
        }
    }
}

fn duration_as_ns(duration: Duration) -> u64 {
    // Saturates after ~584 years of session uptime.
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_as_ns_saturates() {
        assert_eq!(duration_as_ns(Duration::from_nanos(1500)), 1500);
        assert_eq!(duration_as_ns(Duration::MAX), u64::MAX);
    }
}
