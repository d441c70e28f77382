//! Prelude for loopwatch-stacks.
//!
//! Re-exports the types most callers need.
//!
//! # Example
//!
//! ```no_run
//! use loopwatch_stacks::prelude::*;
//!
//! let source = SignalStackSource::new(MonitoredThread::current());
//! ```

pub use crate::error::{CaptureResult, StackCaptureError};
pub use crate::frame::StackFrame;
pub use crate::source::{FixedStackSource, MonitoredThread, SignalStackSource, StackSource};
