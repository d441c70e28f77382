//! The panic hook forces a final report for the in-flight dispatch.
//!
//! Kept in its own test binary: the hook is process-global state.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use loopwatch_test_helpers::prelude::*;

#[test]
fn test_panic_forces_final_report() {
    let hook = Arc::new(ManualDispatchHook::new());
    let source = Arc::new(ScriptedStackSource::of_symbols(&["app::busy_work"]));
    let reporter = Arc::new(CountingReporter::new());
    let dyn_hook: Arc<dyn DispatchHook> = hook.clone();
    let dyn_source: Arc<dyn StackSource> = source;
    let dyn_reporter: Arc<dyn Reporter> = reporter.clone();
    let watchdog = Arc::new(LoopWatchdog::with_reporter(
        dyn_hook,
        dyn_source,
        dyn_reporter,
    ));

    let config = WatchdogConfig::builder()
        .stall_threshold(Duration::from_millis(100))
        .sample_interval(Duration::from_millis(20))
        .initial_sample_delay(Duration::from_millis(10))
        .sync_slack(Duration::from_millis(400))
        .build();
    let Ok(config) = config else {
        unreachable!("scenario config is valid");
    };
    assert!(watchdog.start(config).is_ok());

    hook.begin_dispatch();
    thread::sleep(Duration::from_millis(60));

    // Silence the default printing hook for the induced panic, then chain
    // the reporter hook in front of it.
    std::panic::set_hook(Box::new(|_| {}));
    install_panic_reporter(&watchdog);

    let caught = std::panic::catch_unwind(|| panic!("dispatch blew up"));
    assert!(caught.is_err());
    drop(std::panic::take_hook());

    // The hook ran before unwinding continued: direct line plus the samples
    // gathered in the first ~60ms.
    assert_eq!(reporter.stall_count(), 1);
    assert_eq!(reporter.report_count(), 1);
    assert!(reporter.total_samples() >= 1);

    watchdog.stop();
}
