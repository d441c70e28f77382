//! Panic hook wiring for the failure escape hatch.

use std::panic;
use std::sync::{Arc, Weak};

use crate::watchdog::LoopWatchdog;

/// Chain a panic hook that forces a stall report for the in-flight dispatch
/// before the previously installed hook runs.
///
/// A panic that unwinds out of a dispatch means the end boundary will never
/// arrive; without this, the samples gathered for that dispatch would die
/// with the process. The watchdog is held weakly, so the hook disarms itself
/// once the watchdog is dropped.
pub fn install_panic_reporter(watchdog: &Arc<LoopWatchdog>) {
    let weak: Weak<LoopWatchdog> = Arc::downgrade(watchdog);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if let Some(watchdog) = weak.upgrade() {
            watchdog.send_failure_report();
        }
        previous(panic_info);
    }));
}
