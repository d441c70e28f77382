//! Convenience re-exports for tests.

pub use crate::mock::{CountingReporter, ManualDispatchHook, ScriptedStackSource};
pub use loopwatch_stacks::prelude::*;
pub use loopwatch_watchdog::prelude::*;
