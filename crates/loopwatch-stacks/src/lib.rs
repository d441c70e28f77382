//! # loopwatch-stacks
//!
//! Cross-thread stack capture for the loopwatch stall watchdog.
//!
//! The watchdog samples the monitored thread's call stack from a background
//! worker, so this crate's one job is: given a handle to another thread,
//! return an ordered list of frame descriptors for whatever that thread is
//! doing right now, without suspending it.
//!
//! On Unix this is done by interrupting the target with a reserved signal.
//! The signal handler walks its own stack into a pre-published buffer using
//! frame-pointer unwinding (no allocation, no locks inside the handler);
//! symbol resolution happens afterwards on the requesting thread. Other
//! platforms report [`StackCaptureError::Unsupported`].
//!
//! ## Example
//!
//! ```no_run
//! use loopwatch_stacks::{MonitoredThread, SignalStackSource, StackSource};
//!
//! // On the thread to monitor:
//! let handle = MonitoredThread::current();
//!
//! // On any other thread:
//! let source = SignalStackSource::new(handle);
//! let frames = source.capture()?;
//! for frame in &frames {
//!     println!("{frame}");
//! }
//! # Ok::<(), loopwatch_stacks::StackCaptureError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod frame;
mod platform;
pub mod source;

pub mod prelude;

pub use error::{CaptureResult, StackCaptureError};
pub use frame::StackFrame;
pub use source::{FixedStackSource, MonitoredThread, SignalStackSource, StackSource};
