//! Unix backend: signal-driven stack walks.
//!
//! Protocol:
//!
//! 1. The requesting thread allocates a [`CaptureSession`] holding the target
//!    thread id and a fixed-size instruction-pointer buffer, publishes it via
//!    [`CURRENT_SESSION`] (Release store), then sends [`CAPTURE_SIGNAL`] to
//!    the target.
//! 2. The target's signal handler loads the session (Acquire), verifies it is
//!    the addressed thread, walks its stack with
//!    `backtrace::trace_unsynchronized` into the pre-allocated buffer, and
//!    publishes the frame count with a Release store on `len`.
//! 3. The requester spins (with a deadline) on `len`, clears
//!    [`CURRENT_SESSION`], reclaims the session, and resolves the raw
//!    instruction pointers to symbols on its own thread, outside any signal
//!    context.
//!
//! The handler performs no allocation and takes no lock; a stray or late
//! signal observes a null session pointer and returns without touching
//! anything. Rounds are serialized so `trace_unsynchronized` is never
//! invoked concurrently from two handlers.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::Once;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{CaptureResult, StackCaptureError};
use crate::frame::StackFrame;
use crate::source::MonitoredThread;

/// Maximum call-stack depth stored per capture.
const MAX_FRAMES: usize = 128;

/// Signal used to interrupt the target thread for a stack walk. SIGUSR1 is
/// left untouched since host applications commonly claim it.
const CAPTURE_SIGNAL: libc::c_int = libc::SIGUSR2;

/// Polling granularity while waiting for the handler's reply.
const REPLY_POLL: Duration = Duration::from_micros(50);

/// Symbol prefixes belonging to the capture machinery itself. Leading frames
/// matching these are the signal trampoline and our handler, not the code the
/// target thread was actually running.
const MACHINERY_PREFIXES: &[&str] = &[
    "loopwatch_stacks::",
    "backtrace::",
    "rustc_demangle::",
    "_sigtramp",
    "__",
];

/// One in-flight capture request.
struct CaptureSession {
    target: libc::pthread_t,
    /// Written exclusively by the target's signal handler before `len` is set.
    ips: UnsafeCell<[usize; MAX_FRAMES]>,
    /// 0 until the handler is done; stored with Release.
    len: AtomicUsize,
}

// SAFETY: `ips` is written by exactly one thread (the signal handler of the
// addressed target) and read by the requester only after the Release/Acquire
// pair on `len` establishes the happens-before.
unsafe impl Sync for CaptureSession {}

/// Pointer to the live session, or null when no capture is active.
static CURRENT_SESSION: AtomicPtr<CaptureSession> = AtomicPtr::new(ptr::null_mut());

/// Serializes capture rounds: one session at a time, and
/// `trace_unsynchronized` never runs concurrently in two handlers.
static ROUND: Mutex<()> = Mutex::new(());

static INSTALL_HANDLER: Once = Once::new();

extern "C" fn capture_signal_handler(_: libc::c_int) {
    let session_ptr = CURRENT_SESSION.load(Ordering::Acquire);
    if session_ptr.is_null() {
        // Stray delayed signal after the requester gave up; ignore.
        return;
    }
    // SAFETY: the requester keeps the session allocation alive until after it
    // clears CURRENT_SESSION, and leaks it if the handler may still be
    // running (timeout path), so the pointer is valid here.
    let session: &CaptureSession = unsafe { &*session_ptr };

    // SAFETY: pthread_self has no preconditions.
    let me = unsafe { libc::pthread_self() };
    if session.target != me {
        // Addressed to a different thread; leave the buffer alone.
        return;
    }

    // SAFETY: this is the only thread that writes `ips` for this session
    // (target check above), and the requester reads it only after observing
    // the Release store on `len` below.
    let buf: &mut [usize; MAX_FRAMES] = unsafe { &mut *session.ips.get() };
    let mut count = 0usize;
    // SAFETY: ROUND (held by the requester for the whole exchange) ensures no
    // two handlers walk concurrently, and frame-pointer walking allocates
    // nothing and takes no locks, so it is async-signal-safe here.
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            if count < MAX_FRAMES {
                buf[count] = frame.ip() as usize;
                count += 1;
                true
            } else {
                false
            }
        });
    }

    // Pairs with the Acquire load in the requester, making the buffer writes
    // visible before the count.
    session.len.store(count, Ordering::Release);
}

fn install_handler() {
    INSTALL_HANDLER.call_once(|| {
        // SAFETY: installing a handler for a signal unused elsewhere in this
        // process; the handler only touches async-signal-safe state.
        unsafe {
            libc::signal(CAPTURE_SIGNAL, capture_signal_handler as libc::sighandler_t);
        }
    });
}

pub(crate) fn capture(
    thread: &MonitoredThread,
    reply_timeout: Duration,
) -> CaptureResult<Vec<StackFrame>> {
    let _round = ROUND.lock();
    install_handler();

    let session = Box::new(CaptureSession {
        target: thread.pthread(),
        ips: UnsafeCell::new([0; MAX_FRAMES]),
        len: AtomicUsize::new(0),
    });
    let session_ptr = Box::into_raw(session);
    CURRENT_SESSION.store(session_ptr, Ordering::Release);

    // SAFETY: session_ptr was just created from Box::into_raw and is live.
    let session: &CaptureSession = unsafe { &*session_ptr };

    // SAFETY: pthread_kill with a valid signal number; an invalid (exited)
    // thread id yields a nonzero error code rather than UB for ids obtained
    // from pthread_self within this process.
    let rc = unsafe { libc::pthread_kill(thread.pthread(), CAPTURE_SIGNAL) };
    if rc != 0 {
        CURRENT_SESSION.store(ptr::null_mut(), Ordering::Release);
        // SAFETY: the handler never ran for this session (signal was not
        // delivered), so the requester is the sole owner again.
        drop(unsafe { Box::from_raw(session_ptr) });
        return Err(StackCaptureError::SignalDelivery(rc));
    }

    let deadline = Instant::now() + reply_timeout;
    let mut replied = false;
    loop {
        if session.len.load(Ordering::Acquire) != 0 {
            replied = true;
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(REPLY_POLL);
    }

    // Unpublish before reclaiming so any late signal sees null and exits.
    CURRENT_SESSION.store(ptr::null_mut(), Ordering::Release);

    if !replied {
        // The handler may still be mid-walk; the session is intentionally
        // leaked so a late write never lands in freed memory. Bounded: one
        // small allocation per timed-out round.
        return Err(StackCaptureError::Timeout(reply_timeout));
    }

    // SAFETY: `replied` means the handler finished (the Release store on
    // `len` is its last access), so ownership is safely reclaimed.
    let session = unsafe { Box::from_raw(session_ptr) };
    let len = session.len.load(Ordering::Acquire).min(MAX_FRAMES);
    // SAFETY: the handler is done with the buffer (see above) and the
    // requester owns the session again.
    let buf = unsafe { &*session.ips.get() };

    Ok(resolve_ips(buf.iter().take(len).copied()))
}

/// Resolve raw instruction pointers to frames, stripping the leading capture
/// machinery (signal trampoline, our handler) so the first frame is what the
/// target thread was actually executing.
fn resolve_ips(ips: impl Iterator<Item = usize>) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    let mut fallback: Vec<StackFrame> = Vec::new();
    let mut found_user_code = false;

    for ip in ips {
        let mut resolved: Vec<StackFrame> = Vec::new();
        backtrace::resolve(ip as *mut c_void, |symbol| {
            resolved.push(StackFrame {
                symbol: symbol.name().map(|n| n.to_string()),
                file: symbol
                    .filename()
                    .and_then(|p| p.to_str())
                    .map(str::to_owned),
                line: symbol.lineno(),
            });
        });
        if resolved.is_empty() {
            resolved.push(StackFrame::unresolved());
        }

        fallback.extend(resolved.iter().cloned());

        if !found_user_code {
            let is_machinery = resolved.iter().all(is_machinery_frame);
            if is_machinery {
                continue;
            }
            found_user_code = true;
        }
        frames.extend(resolved);
    }

    // A walk made purely of machinery frames is still better than nothing.
    if frames.is_empty() { fallback } else { frames }
}

fn is_machinery_frame(frame: &StackFrame) -> bool {
    match frame.symbol.as_deref() {
        None => true,
        Some(name) => MACHINERY_PREFIXES.iter().any(|p| name.starts_with(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SignalStackSource, StackSource};
    use std::sync::mpsc;

    #[test]
    fn test_capture_sleeping_thread() {
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let target = thread::spawn(move || {
            let _sent = tx.send(MonitoredThread::current());
            // Keep the thread alive and parked while it is captured.
            let _parked = done_rx.recv_timeout(Duration::from_secs(5));
        });

        let monitored = match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(m) => m,
            Err(e) => unreachable!("target thread never reported its id: {e}"),
        };

        let source = SignalStackSource::new(monitored)
            .with_reply_timeout(Duration::from_millis(500));
        let result = source.capture();
        let _released = done_tx.send(());
        let _joined = target.join();

        match result {
            Ok(frames) => assert!(!frames.is_empty(), "expected at least one frame"),
            Err(e) => unreachable!("capture failed: {e}"),
        }
    }

    #[test]
    fn test_machinery_filter() {
        assert!(is_machinery_frame(&StackFrame::named("__restore_rt")));
        assert!(is_machinery_frame(&StackFrame::unresolved()));
        assert!(!is_machinery_frame(&StackFrame::named("app::handle_event")));
    }
}
