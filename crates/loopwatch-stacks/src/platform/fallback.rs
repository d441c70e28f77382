//! Fallback backend for platforms without cross-thread capture.

use std::time::Duration;

use crate::error::{CaptureResult, StackCaptureError};
use crate::frame::StackFrame;
use crate::source::MonitoredThread;

pub(crate) fn capture(
    _thread: &MonitoredThread,
    _reply_timeout: Duration,
) -> CaptureResult<Vec<StackFrame>> {
    Err(StackCaptureError::Unsupported)
}
