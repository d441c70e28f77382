//! # loopwatch-watchdog
//!
//! Detects when a main loop — an event or message loop that must stay
//! responsive — spends too long on a single unit of work, and captures a
//! time-series of the stalled thread's call stacks so the offending path can
//! be diagnosed after the fact.
//!
//! The monitored thread is never paused and never takes a lock on its
//! per-dispatch path. The host's loop instrumentation fires one opaque
//! notification at each dispatch edge; on begin, the watchdog schedules a
//! sampling task onto its own background worker, and on end it either
//! cancels the task (the dispatch was within budget) or lets it run to its
//! own timeout and report. Cancellation is advisory by design: a tick
//! already in flight may land one extra sample, or even one extra report,
//! but a run can never keep sampling past its self-declared timeout.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use loopwatch_watchdog::prelude::*;
//! use loopwatch_stacks::FixedStackSource;
//!
//! // The host adapts its loop's instrumentation point to `DispatchHook`;
//! // this stand-in just discards the sink.
//! struct NoopHook;
//! impl DispatchHook for NoopHook {
//!     fn install(&self, _sink: Option<Arc<dyn DispatchSink>>) {}
//! }
//!
//! let source = Arc::new(FixedStackSource::of_symbols(&["app::main"]));
//! let watchdog = Arc::new(LoopWatchdog::new(Arc::new(NoopHook), source));
//!
//! watchdog.start(WatchdogConfig::default())?;
//! assert!(watchdog.is_running());
//!
//! // Let a global failure handler force a final report before dying:
//! install_panic_reporter(&watchdog);
//!
//! watchdog.stop();
//! # Ok::<(), loopwatch_watchdog::WatchdogError>(())
//! ```
//!
//! On Unix hosts, pass a
//! [`SignalStackSource`](loopwatch_stacks::SignalStackSource) built from a
//! [`MonitoredThread`](loopwatch_stacks::MonitoredThread) handle captured on
//! the loop thread.

#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod listener;
pub mod panic_hook;
pub mod report;
pub mod sampler;
pub mod watchdog;
pub mod worker;

pub mod prelude;

pub use config::{WatchdogConfig, WatchdogConfigBuilder};
pub use error::{WatchdogError, WatchdogResult};
pub use listener::{DispatchHook, DispatchSink};
pub use panic_hook::install_panic_reporter;
pub use report::{LogReporter, Reporter};
pub use sampler::{SampleBuffer, StackSample};
pub use watchdog::{LoopWatchdog, WatchdogState};

// Re-export the capture-facility types most hosts need alongside the core.
pub use loopwatch_stacks::{StackFrame, StackSource};
