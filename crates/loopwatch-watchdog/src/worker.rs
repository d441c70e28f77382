//! The background execution context: one dedicated thread with a private,
//! ordered delay queue.
//!
//! The monitored thread posts work with fire-and-forget sends on an
//! unbounded channel, so scheduling never blocks it. The worker thread owns
//! the queue and the clock: it sleeps until the earliest due time, pops due
//! tasks in order, and lets tasks reschedule themselves through the handle
//! they receive. Cancellation is best-effort removal of not-yet-run entries;
//! a task already executing finishes on its own terms.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

/// Identifier tying scheduled queue entries to the run that posted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Work item runnable on the sampler worker.
///
/// Tasks are consumed when run; a task that wants to run again posts itself
/// back through the provided handle.
pub trait WorkerTask: Send {
    /// Execute on the worker thread.
    fn run(self: Box<Self>, worker: &WorkerHandle);
}

enum Command {
    Schedule {
        id: TaskId,
        due: Instant,
        task: Box<dyn WorkerTask>,
    },
    Cancel(TaskId),
    Shutdown,
}

struct QueuedTask {
    due: Instant,
    seq: u64,
    id: TaskId,
    task: Box<dyn WorkerTask>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; invert so the earliest due time pops
        // first, FIFO among equal deadlines.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cloneable handle for posting work to the worker.
///
/// All operations are fire-and-forget; posting to a worker that has already
/// shut down is silently dropped.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: Sender<Command>,
    next_id: Arc<AtomicU64>,
}

impl WorkerHandle {
    /// Allocate an id for a new logical task.
    pub fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Schedule `task` to run after `delay`. Never blocks.
    pub fn schedule_in(&self, id: TaskId, delay: Duration, task: Box<dyn WorkerTask>) {
        let due = Instant::now() + delay;
        if self.tx.send(Command::Schedule { id, due, task }).is_err() {
            debug!(target: "loopwatch", "schedule after worker shutdown dropped");
        }
    }

    /// Best-effort removal of any pending (not yet run) entry for `id`.
    ///
    /// An entry whose task is mid-run, or whose reschedule is still in
    /// flight, is not removed; such a task is expected to notice its own
    /// cancellation flag instead.
    pub fn cancel(&self, id: TaskId) {
        if self.tx.send(Command::Cancel(id)).is_err() {
            debug!(target: "loopwatch", "cancel after worker shutdown dropped");
        }
    }
}

/// The background worker thread and its queue.
#[derive(Debug)]
pub struct SamplerWorker {
    handle: WorkerHandle,
    thread: Option<JoinHandle<()>>,
}

impl SamplerWorker {
    /// Polling granularity while waiting for the worker to quiesce.
    const SHUTDOWN_POLL: Duration = Duration::from_millis(1);

    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be created.
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let handle = WorkerHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        };
        let loop_handle = handle.clone();
        let thread = thread::Builder::new()
            .name("loopwatch-sampler".to_owned())
            .spawn(move || run_loop(&rx, &loop_handle))?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// A handle for posting work.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Request orderly termination and wait up to `grace` for the thread to
    /// quiesce. If it does not, the thread is detached; it exits on its own
    /// as soon as it drains the shutdown request, at worst after finishing
    /// the task it is currently running.
    pub fn shutdown(mut self, grace: Duration) {
        if self.handle.tx.send(Command::Shutdown).is_err() {
            debug!(target: "loopwatch", "worker channel already closed at shutdown");
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        let deadline = Instant::now() + grace;
        while !thread.is_finished() && Instant::now() < deadline {
            thread::sleep(Self::SHUTDOWN_POLL);
        }
        if thread.is_finished() {
            if thread.join().is_err() {
                warn!(target: "loopwatch", "sampler worker panicked before shutdown");
            }
        } else {
            warn!(
                target: "loopwatch",
                grace_ms = grace.as_millis() as u64,
                "sampler worker did not quiesce in time; detaching"
            );
        }
    }
}

fn run_loop(rx: &Receiver<Command>, handle: &WorkerHandle) {
    let mut queue: BinaryHeap<QueuedTask> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let command = if let Some(next) = queue.peek() {
            match rx.recv_deadline(next.due) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            }
        };

        match command {
            Some(Command::Schedule { id, due, task }) => {
                seq += 1;
                queue.push(QueuedTask { due, seq, id, task });
            }
            Some(Command::Cancel(id)) => {
                queue.retain(|entry| entry.id != id);
            }
            Some(Command::Shutdown) => {
                debug!(
                    target: "loopwatch",
                    pending = queue.len(),
                    "sampler worker shutting down"
                );
                return;
            }
            None => {
                // At least one entry is due; run everything whose time has come.
                let now = Instant::now();
                while queue.peek().is_some_and(|entry| entry.due <= now) {
                    if let Some(entry) = queue.pop() {
                        entry.task.run(handle);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_task_id() -> TaskId {
    TaskId(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingTask {
        label: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl WorkerTask for RecordingTask {
        fn run(self: Box<Self>, _worker: &WorkerHandle) {
            self.log.lock().push(self.label);
        }
    }

    struct RepostingTask {
        remaining: u32,
        id: TaskId,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl WorkerTask for RepostingTask {
        fn run(mut self: Box<Self>, worker: &WorkerHandle) {
            self.log.lock().push(self.remaining);
            if self.remaining > 0 {
                self.remaining -= 1;
                let id = self.id;
                worker.schedule_in(id, Duration::from_millis(5), self);
            }
        }
    }

    fn spawn_worker() -> SamplerWorker {
        match SamplerWorker::spawn() {
            Ok(worker) => worker,
            Err(e) => unreachable!("worker spawn failed: {e}"),
        }
    }

    #[test]
    fn test_tasks_run_in_due_order() {
        let worker = spawn_worker();
        let handle = worker.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        handle.schedule_in(
            handle.next_task_id(),
            Duration::from_millis(40),
            Box::new(RecordingTask {
                label: 2,
                log: Arc::clone(&log),
            }),
        );
        handle.schedule_in(
            handle.next_task_id(),
            Duration::from_millis(10),
            Box::new(RecordingTask {
                label: 1,
                log: Arc::clone(&log),
            }),
        );

        thread::sleep(Duration::from_millis(100));
        assert_eq!(*log.lock(), vec![1, 2]);
        worker.shutdown(Duration::from_millis(200));
    }

    #[test]
    fn test_cancel_removes_pending_task() {
        let worker = spawn_worker();
        let handle = worker.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = handle.next_task_id();
        handle.schedule_in(
            id,
            Duration::from_millis(50),
            Box::new(RecordingTask {
                label: 1,
                log: Arc::clone(&log),
            }),
        );
        handle.cancel(id);

        thread::sleep(Duration::from_millis(120));
        assert!(log.lock().is_empty());
        worker.shutdown(Duration::from_millis(200));
    }

    #[test]
    fn test_task_can_reschedule_itself() {
        let worker = spawn_worker();
        let handle = worker.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = handle.next_task_id();
        handle.schedule_in(
            id,
            Duration::from_millis(5),
            Box::new(RepostingTask {
                remaining: 3,
                id,
                log: Arc::clone(&log),
            }),
        );

        thread::sleep(Duration::from_millis(120));
        assert_eq!(*log.lock(), vec![3, 2, 1, 0]);
        worker.shutdown(Duration::from_millis(200));
    }

    #[test]
    fn test_schedule_after_shutdown_is_dropped() {
        let worker = spawn_worker();
        let handle = worker.handle();
        worker.shutdown(Duration::from_millis(200));

        let log = Arc::new(Mutex::new(Vec::new()));
        handle.schedule_in(
            handle.next_task_id(),
            Duration::from_millis(1),
            Box::new(RecordingTask {
                label: 1,
                log: Arc::clone(&log),
            }),
        );
        thread::sleep(Duration::from_millis(30));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_shutdown_with_pending_tasks_is_prompt() {
        let worker = spawn_worker();
        let handle = worker.handle();
        let log = Arc::new(Mutex::new(Vec::new()));
        handle.schedule_in(
            handle.next_task_id(),
            Duration::from_secs(60),
            Box::new(RecordingTask {
                label: 1,
                log: Arc::clone(&log),
            }),
        );

        let started = Instant::now();
        worker.shutdown(Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(log.lock().is_empty());
    }
}
