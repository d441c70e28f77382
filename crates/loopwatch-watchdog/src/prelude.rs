//! Prelude for loopwatch-watchdog.
//!
//! Re-exports the types a host needs to wire up and run the watchdog.
//!
//! # Example
//!
//! ```ignore
//! use loopwatch_watchdog::prelude::*;
//!
//! let watchdog = LoopWatchdog::new(hook, source);
//! watchdog.start(WatchdogConfig::default())?;
//! ```

pub use crate::config::{WatchdogConfig, WatchdogConfigBuilder};
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::listener::{DispatchHook, DispatchSink};
pub use crate::panic_hook::install_panic_reporter;
pub use crate::report::{LogReporter, Reporter};
pub use crate::sampler::{SampleBuffer, StackSample};
pub use crate::watchdog::{LoopWatchdog, WatchdogState};
pub use loopwatch_stacks::{StackFrame, StackSource};
