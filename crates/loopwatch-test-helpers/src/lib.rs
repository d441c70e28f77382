//! Shared test utilities for loopwatch.
//!
//! Test doubles for the three seams the watchdog is built against: the loop
//! instrumentation facility, the stack source, and the report sink. Used as
//! a dev-dependency by the workspace crates.
//!
//! # Usage
//!
//! ```rust,ignore
//! use loopwatch_test_helpers::prelude::*;
//!
//! let hook = Arc::new(ManualDispatchHook::new());
//! let source = Arc::new(ScriptedStackSource::of_symbols(&["app::busy"]));
//! let reporter = Arc::new(CountingReporter::new());
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod mock;
pub mod prelude;

pub use mock::{CountingReporter, ManualDispatchHook, ScriptedStackSource};
