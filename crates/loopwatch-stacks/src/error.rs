//! Error types for stack capture.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while capturing another thread's stack.
#[derive(Debug, Clone, Error)]
pub enum StackCaptureError {
    /// The capture signal could not be delivered to the target thread,
    /// typically because the thread has already exited.
    #[error("failed to deliver capture signal to target thread: errno {0}")]
    SignalDelivery(i32),

    /// The target thread did not fill the capture buffer in time. This can
    /// happen when the target is blocked in uninterruptible kernel code.
    #[error("target thread did not reply to capture signal within {0:?}")]
    Timeout(Duration),

    /// Cross-thread stack capture is not implemented for this platform.
    #[error("stack capture is not supported on this platform")]
    Unsupported,
}

/// A specialized `Result` type for capture operations.
pub type CaptureResult<T> = std::result::Result<T, StackCaptureError>;
